// =====================================================================================
// File: core-observability/src/lib.rs
// Description: Observability utilities for SentinelDLP platform - logging, metrics, health
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::*;
pub use logging::*;
pub use metrics::*;

use thiserror::Error;

/// Observability errors
#[derive(Error, Debug)]
pub enum ObservabilityError {
    #[error("Metrics error: {0}")]
    Metrics(String),
    #[error("Tracing error: {0}")]
    Tracing(String),
    #[error("Health check error: {0}")]
    HealthCheck(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_error_display() {
        let error = ObservabilityError::Metrics("test error".to_string());
        assert_eq!(error.to_string(), "Metrics error: test error");

        let error = ObservabilityError::Tracing("trace error".to_string());
        assert_eq!(error.to_string(), "Tracing error: trace error");
    }
}
