// =====================================================================================
// File: core-siem/src/connector.rs
// Description: Abstract SIEM connector interface and shared result types
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::SiemResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_events::{DlpEvent, Severity};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Supported SIEM families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiemType {
    Elk,
    Splunk,
    Qradar,
    Sentinel,
    Wazuh,
    Custom,
}

impl SiemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiemType::Elk => "elk",
            SiemType::Splunk => "splunk",
            SiemType::Qradar => "qradar",
            SiemType::Sentinel => "sentinel",
            SiemType::Wazuh => "wazuh",
            SiemType::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "elk" | "elasticsearch" => Some(SiemType::Elk),
            "splunk" => Some(SiemType::Splunk),
            "qradar" => Some(SiemType::Qradar),
            "sentinel" => Some(SiemType::Sentinel),
            "wazuh" => Some(SiemType::Wazuh),
            "custom" => Some(SiemType::Custom),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry-tracked lifecycle state of one connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorState {
    Registered,
    Connected,
    Unhealthy,
    Disconnected,
}

/// Result of a connectivity probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ConnectionTest {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: serde_json::Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: serde_json::Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Aggregate outcome of a bulk ingestion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    pub total: usize,
    pub indexed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn complete(total: usize, indexed: usize, index: Option<String>) -> Self {
        let failed = total.saturating_sub(indexed);
        Self {
            success: failed == 0,
            total,
            indexed,
            failed,
            index,
            error: None,
        }
    }

    pub fn rejected(total: usize, error: impl Into<String>) -> Self {
        Self {
            success: false,
            total,
            indexed: 0,
            failed: total,
            index: None,
            error: Some(error.into()),
        }
    }
}

/// Standing alert definition installed into a sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRequest {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Sink-native query that triggers the alert
    pub query: String,
    /// Probe schedule, e.g. `5m` (ELK Watcher interval)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Hit-count threshold above which the alert fires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    /// Cron schedule for scheduled-search sinks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_to: Option<String>,
}

impl AlertRequest {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity,
            query: query.into(),
            interval: None,
            threshold: None,
            cron: None,
            expires: None,
            email_to: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email_to = Some(email.into());
        self
    }
}

/// Result of installing an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCreation {
    pub success: bool,
    pub alert_id: String,
    pub message: String,
}

/// Health probe status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiemHealthStatus {
    Healthy,
    Unhealthy,
    Error,
}

/// Health probe result for one connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiemHealth {
    pub name: String,
    pub siem_type: SiemType,
    pub status: SiemHealthStatus,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Registry listing entry for the admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSummary {
    pub name: String,
    pub siem_type: SiemType,
    pub connected: bool,
    pub state: ConnectorState,
    pub active: bool,
}

/// Abstract SIEM connector.
///
/// Implementations own their transport resources and release them on
/// `disconnect`. All methods are cancel-safe: an aborted call leaves the
/// connector in a state where retry is valid.
#[async_trait]
pub trait SiemConnector: Send + Sync {
    /// Human-readable connector name, unique within the registry
    fn name(&self) -> &str;

    fn siem_type(&self) -> SiemType;

    /// Whether the transport is currently established
    fn connected(&self) -> bool;

    /// Establish the transport and, when credentials are present, an auth
    /// context
    async fn connect(&self) -> SiemResult<()>;

    /// Close the transport
    async fn disconnect(&self) -> SiemResult<()>;

    /// Probe connectivity without mutating sink state
    async fn test_connection(&self) -> SiemResult<ConnectionTest>;

    /// Format the event into the common envelope and transmit it.
    /// Success means the sink acknowledged the write.
    async fn send_event(&self, event: &DlpEvent, index: Option<&str>) -> SiemResult<()>;

    /// Bulk ingestion using the sink's native batching protocol where one
    /// exists. `indexed + failed == total` always holds in the result.
    async fn send_batch(&self, events: &[DlpEvent], index: Option<&str>)
        -> SiemResult<BatchResult>;

    /// Query events back from the sink
    async fn query_events(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> SiemResult<Vec<serde_json::Value>>;

    /// Install a scheduled/standing alert in the sink
    async fn create_alert(&self, request: &AlertRequest) -> SiemResult<AlertCreation>;

    /// Health probe built on `test_connection`; never returns an error
    async fn health_check(&self) -> SiemHealth {
        let started = Instant::now();
        match self.test_connection().await {
            Ok(test) => SiemHealth {
                name: self.name().to_string(),
                siem_type: self.siem_type(),
                status: if test.success {
                    SiemHealthStatus::Healthy
                } else {
                    SiemHealthStatus::Unhealthy
                },
                connected: self.connected(),
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: if test.success { None } else { Some(test.message) },
                timestamp: Utc::now(),
            },
            Err(e) => SiemHealth {
                name: self.name().to_string(),
                siem_type: self.siem_type(),
                status: SiemHealthStatus::Error,
                connected: false,
                latency_ms: None,
                error: Some(e.to_string()),
                timestamp: Utc::now(),
            },
        }
    }
}
