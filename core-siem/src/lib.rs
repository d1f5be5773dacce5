// =====================================================================================
// File: core-siem/src/lib.rs
// Description: Multi-SIEM connector registry and event fan-out
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core SIEM Module
//!
//! Forwarding of processed DLP events to external SIEM systems:
//! - Abstract connector interface with per-vendor implementations (ELK,
//!   Splunk)
//! - Registry managing the connector set with concurrent fan-out
//! - Per-sink health checks and partial-failure semantics: one failing sink
//!   never fails the pipeline

pub mod connector;
pub mod elk;
pub mod registry;
pub mod splunk;

pub use connector::{
    AlertCreation, AlertRequest, BatchResult, ConnectionTest, ConnectorState, ConnectorSummary,
    SiemConnector, SiemHealth, SiemHealthStatus, SiemType,
};
pub use elk::ElkConnector;
pub use registry::SiemRegistry;
pub use splunk::SplunkConnector;

use thiserror::Error;

/// Result type alias for SIEM operations
pub type SiemResult<T> = Result<T, SiemError>;

/// SIEM integration errors
#[derive(Error, Debug, Clone)]
pub enum SiemError {
    /// Transport could not be established
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// The sink rejected or failed a write
    #[error("Transport error: {message}")]
    TransportError { message: String },

    /// Credentials missing or rejected
    #[error("Authentication error: {message}")]
    AuthenticationError { message: String },

    /// Query execution failed
    #[error("Query error: {message}")]
    QueryError { message: String },

    /// Alert installation failed
    #[error("Alert error: {message}")]
    AlertError { message: String },

    /// Connector used before connect()
    #[error("Connector not connected: {name}")]
    NotConnected { name: String },

    /// Invalid connector configuration
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Payload serialization failed
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl SiemError {
    pub fn connection_error<S: Into<String>>(message: S) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    pub fn transport_error<S: Into<String>>(message: S) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    pub fn authentication_error<S: Into<String>>(message: S) -> Self {
        Self::AuthenticationError {
            message: message.into(),
        }
    }

    pub fn query_error<S: Into<String>>(message: S) -> Self {
        Self::QueryError {
            message: message.into(),
        }
    }

    pub fn alert_error<S: Into<String>>(message: S) -> Self {
        Self::AlertError {
            message: message.into(),
        }
    }

    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Whether the failure indicates the sink itself is unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SiemError::ConnectionError { .. } | SiemError::NotConnected { .. }
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            SiemError::ConnectionError { .. } => "connection",
            SiemError::TransportError { .. } => "transport",
            SiemError::AuthenticationError { .. } => "authentication",
            SiemError::QueryError { .. } => "query",
            SiemError::AlertError { .. } => "alert",
            SiemError::NotConnected { .. } => "not_connected",
            SiemError::ConfigurationError { .. } => "configuration",
            SiemError::SerializationError { .. } => "serialization",
        }
    }
}

impl From<reqwest::Error> for SiemError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::ConnectionError {
                message: err.to_string(),
            }
        } else {
            Self::TransportError {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for SiemError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for SiemError {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigurationError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SiemError::connection_error("refused").category(),
            "connection"
        );
        assert_eq!(SiemError::query_error("bad dsl").category(), "query");
        assert_eq!(
            SiemError::NotConnected {
                name: "elk".to_string()
            }
            .category(),
            "not_connected"
        );
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(SiemError::connection_error("refused").is_connectivity());
        assert!(!SiemError::transport_error("rejected").is_connectivity());
    }
}
