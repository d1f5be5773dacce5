// =====================================================================================
// File: core-actions/src/lib.rs
// Description: Policy action executor for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core Actions Module
//!
//! Executes the ordered action plan produced by policy evaluation:
//! - One dedicated handler per action variant, dispatched by exhaustive match
//! - Mutating actions update event state visible to subsequent actions
//! - Delivery-style actions run under a timeout and always produce a result
//! - Idempotent actions carry a deterministic dedup key so redelivery never
//!   duplicates downstream records

pub mod executor;
pub mod providers;

pub use executor::{ActionExecutor, ExecutorConfig};
pub use providers::{
    AuditRecord, AuditSink, LogNotifier, MemoryAuditSink, MemoryQuarantineStore,
    NotificationSender, QuarantineStore, SiemForwarder, WebhookClient,
};

use thiserror::Error;

/// Result type alias for action execution internals
pub type ActionExecResult<T> = Result<T, ActionError>;

/// Action execution errors
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    /// A side-effect provider reported a failure
    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    /// Delivery did not complete within the action timeout
    #[error("Action timed out: {action}")]
    Timeout { action: String },

    /// Webhook endpoint answered with a non-success status
    #[error("Webhook error: status {status}")]
    WebhookError { status: u16 },

    /// Network-level delivery failure
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// The action cannot run against this event
    #[error("Unsupported action: {message}")]
    Unsupported { message: String },

    /// Serialization error building a delivery payload
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl ActionError {
    pub fn provider_error<S: Into<String>>(provider: S, message: S) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            ActionError::ProviderError { .. } => "provider",
            ActionError::Timeout { .. } => "timeout",
            ActionError::WebhookError { .. } => "webhook",
            ActionError::NetworkError { .. } => "network",
            ActionError::Unsupported { .. } => "unsupported",
            ActionError::SerializationError { .. } => "serialization",
        }
    }
}

impl From<reqwest::Error> for ActionError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}
