// =====================================================================================
// File: core-events/src/lib.rs
// Description: Shared security event model for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core Events Library
//!
//! Shared data model for the DLP pipeline:
//! - Security events submitted by endpoint agents and their canonical shape
//! - Classification hits produced by content detectors
//! - The closed action set and per-action execution results
//! - The common envelope forwarded to SIEM sinks

pub mod action;
pub mod envelope;
pub mod event;
pub mod result;

pub use action::*;
pub use envelope::*;
pub use event::*;
pub use result::*;

use thiserror::Error;

/// Event model errors
#[derive(Error, Debug, Clone)]
pub enum EventError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Result type for event model operations
pub type EventResult<T> = Result<T, EventError>;

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
