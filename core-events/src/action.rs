// =====================================================================================
// File: core-events/src/action.rs
// Description: Closed action set requested by policy rules
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Alert,
    Block,
    Quarantine,
    Redact,
    Encrypt,
    Notify,
    Webhook,
    Audit,
    Tag,
    Escalate,
    Delete,
    Preserve,
    FlagForReview,
    CreateIncident,
    Track,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Alert => "alert",
            ActionType::Block => "block",
            ActionType::Quarantine => "quarantine",
            ActionType::Redact => "redact",
            ActionType::Encrypt => "encrypt",
            ActionType::Notify => "notify",
            ActionType::Webhook => "webhook",
            ActionType::Audit => "audit",
            ActionType::Tag => "tag",
            ActionType::Escalate => "escalate",
            ActionType::Delete => "delete",
            ActionType::Preserve => "preserve",
            ActionType::FlagForReview => "flag_for_review",
            ActionType::CreateIncident => "create_incident",
            ActionType::Track => "track",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Redaction methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMethod {
    Full,
    Partial,
    MaskExceptLast4,
    MaskExceptFirst4,
    Hash,
}

impl Default for RedactionMethod {
    fn default() -> Self {
        RedactionMethod::Full
    }
}

/// Supported encryption algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "AES-256")]
    Aes256,
    #[serde(rename = "AES-128")]
    Aes128,
    #[serde(rename = "RSA-2048")]
    Rsa2048,
    #[serde(rename = "RSA-4096")]
    Rsa4096,
}

impl Default for EncryptionAlgorithm {
    fn default() -> Self {
        EncryptionAlgorithm::Aes256
    }
}

/// Notification channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Slack,
    Teams,
    Pagerduty,
    Sms,
    Webhook,
    Siem,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        NotificationChannel::Email
    }
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Slack => "slack",
            NotificationChannel::Teams => "teams",
            NotificationChannel::Pagerduty => "pagerduty",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Webhook => "webhook",
            NotificationChannel::Siem => "siem",
        }
    }
}

/// One action requested by a matched rule.
///
/// The set is closed; dispatch is an exhaustive match in the executor. The
/// serialized form mirrors the policy file shape: a `type` discriminator with
/// the variant's parameters alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Alert {
        #[serde(default)]
        severity: Option<Severity>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    Block {
        #[serde(default)]
        reason: Option<String>,
    },
    Quarantine {
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        encrypt: bool,
    },
    Redact {
        #[serde(default)]
        method: RedactionMethod,
    },
    Encrypt {
        #[serde(default)]
        algorithm: EncryptionAlgorithm,
    },
    Notify {
        #[serde(default)]
        channel: NotificationChannel,
        #[serde(default)]
        recipients: Vec<String>,
        #[serde(default)]
        template: Option<String>,
    },
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Audit {
        #[serde(default)]
        log_level: Option<String>,
        #[serde(default)]
        retention_days: Option<u32>,
    },
    Tag {
        #[serde(default)]
        tags: Vec<String>,
    },
    Escalate {
        #[serde(default)]
        to_severity: Option<Severity>,
    },
    Delete,
    Preserve {
        #[serde(default)]
        location: Option<String>,
    },
    FlagForReview {
        #[serde(default)]
        reviewer: Option<String>,
        #[serde(default)]
        priority: Option<String>,
    },
    CreateIncident {
        #[serde(default)]
        severity: Option<Severity>,
        #[serde(default)]
        assignee: Option<String>,
    },
    Track,
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::Alert { .. } => ActionType::Alert,
            Action::Block { .. } => ActionType::Block,
            Action::Quarantine { .. } => ActionType::Quarantine,
            Action::Redact { .. } => ActionType::Redact,
            Action::Encrypt { .. } => ActionType::Encrypt,
            Action::Notify { .. } => ActionType::Notify,
            Action::Webhook { .. } => ActionType::Webhook,
            Action::Audit { .. } => ActionType::Audit,
            Action::Tag { .. } => ActionType::Tag,
            Action::Escalate { .. } => ActionType::Escalate,
            Action::Delete => ActionType::Delete,
            Action::Preserve { .. } => ActionType::Preserve,
            Action::FlagForReview { .. } => ActionType::FlagForReview,
            Action::CreateIncident { .. } => ActionType::CreateIncident,
            Action::Track => ActionType::Track,
        }
    }

    /// Whether this action mutates event state visible to later actions
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.action_type(),
            ActionType::Block
                | ActionType::Quarantine
                | ActionType::Redact
                | ActionType::Encrypt
                | ActionType::Escalate
        )
    }

    /// Whether redelivery of this action must not duplicate downstream records
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.action_type(),
            ActionType::Audit
                | ActionType::Tag
                | ActionType::Track
                | ActionType::Alert
                | ActionType::FlagForReview
                | ActionType::CreateIncident
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_deserializes_from_policy_shape() {
        let action: Action =
            serde_json::from_str(r#"{"type": "alert", "severity": "critical"}"#).unwrap();
        match action {
            Action::Alert { severity, .. } => assert_eq!(severity, Some(Severity::Critical)),
            other => panic!("unexpected action: {:?}", other),
        }

        let action: Action = serde_json::from_str(r#"{"type": "block"}"#).unwrap();
        assert_eq!(action.action_type(), ActionType::Block);

        let action: Action = serde_json::from_str(r#"{"type": "track"}"#).unwrap();
        assert_eq!(action.action_type(), ActionType::Track);
    }

    #[test]
    fn test_action_defaults() {
        let action: Action = serde_json::from_str(r#"{"type": "redact"}"#).unwrap();
        match action {
            Action::Redact { method } => assert_eq!(method, RedactionMethod::Full),
            other => panic!("unexpected action: {:?}", other),
        }

        let action: Action = serde_json::from_str(r#"{"type": "notify"}"#).unwrap();
        match action {
            Action::Notify {
                channel,
                recipients,
                ..
            } => {
                assert_eq!(channel, NotificationChannel::Email);
                assert!(recipients.is_empty());
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_webhook_requires_url() {
        assert!(serde_json::from_str::<Action>(r#"{"type": "webhook"}"#).is_err());
        let action: Action =
            serde_json::from_str(r#"{"type": "webhook", "url": "https://hooks.example.com/dlp"}"#)
                .unwrap();
        assert_eq!(action.action_type(), ActionType::Webhook);
    }

    #[test]
    fn test_mutating_and_idempotent_sets() {
        let block: Action = serde_json::from_str(r#"{"type": "block"}"#).unwrap();
        let audit: Action = serde_json::from_str(r#"{"type": "audit"}"#).unwrap();
        assert!(block.is_mutating());
        assert!(!block.is_idempotent());
        assert!(audit.is_idempotent());
        assert!(!audit.is_mutating());
    }

    #[test]
    fn test_action_type_display() {
        assert_eq!(ActionType::FlagForReview.to_string(), "flag_for_review");
        assert_eq!(ActionType::CreateIncident.to_string(), "create_incident");
    }
}
