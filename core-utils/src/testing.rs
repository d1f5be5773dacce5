// =====================================================================================
// File: core-utils/src/testing.rs
// Description: Testing utilities and helpers for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::time::{Duration, Instant};

/// Initialize tracing for tests. Safe to call from every test; only the
/// first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Simple wall-clock timer for latency assertions in tests
pub struct TestTimer {
    start: Instant,
}

impl TestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Assert the measured duration stayed under the given bound
    pub fn assert_under(&self, bound: Duration, operation: &str) {
        let elapsed = self.elapsed();
        assert!(
            elapsed <= bound,
            "{} took {:?}, expected under {:?}",
            operation,
            elapsed,
            bound
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures_elapsed() {
        let timer = TestTimer::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
