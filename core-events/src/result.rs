// =====================================================================================
// File: core-events/src/result.rs
// Description: Policy match and action execution result types
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::{Action, ActionType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One rule that matched an event, with the action plan it requested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMatch {
    pub policy_id: String,
    pub policy_name: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub matched_at: DateTime<Utc>,
    pub actions: Vec<Action>,
}

/// Result of executing one action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: ActionType,
    pub policy_id: String,
    pub rule_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Deterministic key the executor supplies for idempotent delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

impl ActionResult {
    pub fn success(action_type: ActionType, policy_id: &str, rule_id: &str) -> Self {
        Self {
            action_type,
            policy_id: policy_id.to_string(),
            rule_id: rule_id.to_string(),
            success: true,
            message: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            error: None,
            dedup_key: None,
        }
    }

    pub fn failure(
        action_type: ActionType,
        policy_id: &str,
        rule_id: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            policy_id: policy_id.to_string(),
            rule_id: rule_id.to_string(),
            success: false,
            message: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            error: Some(error.into()),
            dedup_key: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// Summary of all actions executed for one event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_executed: Vec<ActionResult>,
    pub total_actions: usize,
    pub successful_actions: usize,
    pub failed_actions: usize,
    pub blocked: bool,
    pub quarantined: bool,
    pub encrypted: bool,
    pub redacted: bool,
    pub notifications_sent: usize,
    pub webhooks_called: usize,
    pub alerts_created: usize,
}

impl ExecutionSummary {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            ..Self::default()
        }
    }

    /// Fold one action result into the summary counters
    pub fn record(&mut self, result: ActionResult) {
        self.total_actions += 1;
        if result.success {
            self.successful_actions += 1;
            match result.action_type {
                ActionType::Alert => self.alerts_created += 1,
                ActionType::Notify => self.notifications_sent += 1,
                ActionType::Webhook => self.webhooks_called += 1,
                ActionType::Block => self.blocked = true,
                ActionType::Quarantine => self.quarantined = true,
                ActionType::Encrypt => self.encrypted = true,
                ActionType::Redact => self.redacted = true,
                _ => {}
            }
        } else {
            self.failed_actions += 1;
        }
        self.actions_executed.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_flags() {
        let mut summary = ExecutionSummary::new("evt-001");
        summary.record(ActionResult::success(ActionType::Alert, "p1", "r1"));
        summary.record(ActionResult::success(ActionType::Block, "p1", "r1"));
        summary.record(ActionResult::failure(
            ActionType::Webhook,
            "p1",
            "r1",
            "connection refused",
        ));

        assert_eq!(summary.total_actions, 3);
        assert_eq!(summary.successful_actions, 2);
        assert_eq!(summary.failed_actions, 1);
        assert!(summary.blocked);
        assert_eq!(summary.alerts_created, 1);
        assert_eq!(summary.webhooks_called, 0);
    }

    #[test]
    fn test_action_result_builders() {
        let result = ActionResult::success(ActionType::Audit, "p1", "r1")
            .with_message("audit recorded")
            .with_metadata("audit_id", serde_json::json!("aud-1"))
            .with_dedup_key("abc123");

        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("audit recorded"));
        assert_eq!(result.dedup_key.as_deref(), Some("abc123"));
        assert_eq!(result.metadata["audit_id"], "aud-1");
    }

    #[test]
    fn test_failure_result_carries_error() {
        let result = ActionResult::failure(ActionType::Notify, "p1", "r1", "smtp unavailable");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("smtp unavailable"));
    }
}
