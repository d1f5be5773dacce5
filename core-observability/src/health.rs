// =====================================================================================
// File: core-observability/src/health.rs
// Description: Health check and readiness probe implementation
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub details: HashMap<String, serde_json::Value>,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            details: HashMap::new(),
            duration: Duration::from_millis(0),
            timestamp: Utc::now(),
        }
    }

    pub fn unhealthy(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message),
            details: HashMap::new(),
            duration: Duration::from_millis(0),
            timestamp: Utc::now(),
        }
    }

    pub fn degraded(message: String) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message),
            details: HashMap::new(),
            duration: Duration::from_millis(0),
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// One named health probe
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> HealthCheckResult;
}

/// Aggregates named health checks into one readiness report
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    /// Run every check; overall status is the worst individual status
    pub async fn check_all(&self) -> (HealthStatus, HashMap<String, HealthCheckResult>) {
        let mut results = HashMap::new();
        let mut overall = HealthStatus::Healthy;

        for check in &self.checks {
            let started = Instant::now();
            let mut result = check.check().await;
            result.duration = started.elapsed();

            debug!(
                check = check.name(),
                status = %result.status,
                duration_ms = result.duration.as_millis() as u64,
                "Health check completed"
            );

            overall = match (&overall, &result.status) {
                (_, HealthStatus::Unhealthy) | (HealthStatus::Unhealthy, _) => {
                    HealthStatus::Unhealthy
                }
                (_, HealthStatus::Degraded) | (HealthStatus::Degraded, _) => HealthStatus::Degraded,
                (HealthStatus::Unknown, _) | (_, HealthStatus::Unknown) => HealthStatus::Unknown,
                _ => HealthStatus::Healthy,
            };

            results.insert(check.name().to_string(), result);
        }

        (overall, results)
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}
