// =====================================================================================
// File: core-actions/src/providers.rs
// Description: Side-effect provider seams used by the action executor
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::{ActionError, ActionExecResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_events::{DlpEvent, NotificationChannel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    /// Deterministic key; sinks must treat records with the same key as one
    pub dedup_key: String,
    pub event_id: String,
    pub policy_id: String,
    pub rule_id: String,
    pub action: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Persistent audit trail the executor appends to
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a record, returning its audit id. Appending a record whose
    /// dedup key was already seen returns the original id without writing a
    /// second record.
    async fn append(&self, record: AuditRecord) -> ActionExecResult<String>;
}

/// Outbound notification delivery (email, chat, paging)
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> ActionExecResult<String>;
}

/// Moves flagged files into quarantine storage
#[async_trait]
pub trait QuarantineStore: Send + Sync {
    /// Returns the quarantine path the file was moved to
    async fn quarantine(
        &self,
        event_id: &str,
        source_path: &str,
        location: Option<&str>,
        encrypt: bool,
    ) -> ActionExecResult<String>;
}

/// Forwards processed events into the SIEM fan-out
#[async_trait]
pub trait SiemForwarder: Send + Sync {
    /// Per-sink delivery outcome, keyed by connector name
    async fn forward(&self, event: &DlpEvent) -> ActionExecResult<HashMap<String, bool>>;
}

/// In-memory audit sink with dedup-key idempotence
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    seen: Mutex<HashMap<String, String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> ActionExecResult<String> {
        let mut seen = self.seen.lock().await;
        if let Some(existing) = seen.get(&record.dedup_key) {
            return Ok(existing.clone());
        }
        let audit_id = record.audit_id.clone();
        seen.insert(record.dedup_key.clone(), audit_id.clone());
        self.records.lock().await.push(record);
        Ok(audit_id)
    }
}

/// Notification sender that records delivery in the log stream.
///
/// Stands in for the mail/chat gateway, which lives outside the core.
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipients: &[String],
        subject: &str,
        _body: &str,
    ) -> ActionExecResult<String> {
        let notification_id = Uuid::new_v4().to_string();
        info!(
            channel = channel.as_str(),
            recipients = recipients.len(),
            subject = %subject,
            notification_id = %notification_id,
            "Notification dispatched"
        );
        Ok(notification_id)
    }
}

/// In-memory quarantine store tracking moved files
pub struct MemoryQuarantineStore {
    entries: Mutex<Vec<QuarantineEntry>>,
}

#[derive(Debug, Clone)]
pub struct QuarantineEntry {
    pub event_id: String,
    pub original_path: String,
    pub quarantine_path: String,
    pub encrypted: bool,
}

impl MemoryQuarantineStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub async fn entries(&self) -> Vec<QuarantineEntry> {
        self.entries.lock().await.clone()
    }
}

impl Default for MemoryQuarantineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuarantineStore for MemoryQuarantineStore {
    async fn quarantine(
        &self,
        event_id: &str,
        source_path: &str,
        location: Option<&str>,
        encrypt: bool,
    ) -> ActionExecResult<String> {
        let file_name = std::path::Path::new(source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ActionError::provider_error("quarantine", "source path has no file name")
            })?;
        let quarantine_path = format!(
            "{}/{}/{}",
            location.unwrap_or("/var/lib/sentinel-dlp/quarantine"),
            event_id,
            file_name
        );
        self.entries.lock().await.push(QuarantineEntry {
            event_id: event_id.to_string(),
            original_path: source_path.to_string(),
            quarantine_path: quarantine_path.clone(),
            encrypted: encrypt,
        });
        Ok(quarantine_path)
    }
}

/// HTTP delivery client for the webhook action
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> ActionExecResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ActionError::from)?;
        Ok(Self { client })
    }

    /// POST a JSON payload, returning the response status code.
    /// Non-2xx statuses are failures.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        payload: &serde_json::Value,
    ) -> ActionExecResult<u16> {
        let mut request = self.client.post(url).json(payload);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(ActionError::WebhookError {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dedup_key: &str) -> AuditRecord {
        AuditRecord {
            audit_id: Uuid::new_v4().to_string(),
            dedup_key: dedup_key.to_string(),
            event_id: "evt-001".to_string(),
            policy_id: "p1".to_string(),
            rule_id: "r1".to_string(),
            action: "audit".to_string(),
            details: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_audit_sink_dedups_by_key() {
        let sink = MemoryAuditSink::new();
        let first = sink.append(record("key-1")).await.unwrap();
        let second = sink.append(record("key-1")).await.unwrap();
        let third = sink.append(record("key-2")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(sink.len().await, 2);
    }

    #[tokio::test]
    async fn test_quarantine_store_builds_path() {
        let store = MemoryQuarantineStore::new();
        let path = store
            .quarantine("evt-001", "/home/user/secrets.xlsx", None, true)
            .await
            .unwrap();
        assert!(path.ends_with("evt-001/secrets.xlsx"));

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].encrypted);
    }

    #[tokio::test]
    async fn test_quarantine_rejects_pathless_source() {
        let store = MemoryQuarantineStore::new();
        assert!(store.quarantine("evt-001", "/", None, false).await.is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_returns_id() {
        let notifier = LogNotifier;
        let id = notifier
            .send(
                NotificationChannel::Email,
                &["security@example.com".to_string()],
                "DLP alert",
                "details",
            )
            .await
            .unwrap();
        assert!(!id.is_empty());
    }
}
