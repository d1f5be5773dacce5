// =====================================================================================
// File: core-pipeline/src/lib.rs
// Description: Six-stage DLP event pipeline orchestrator
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core Pipeline Module
//!
//! Sequences the per-event processing stages:
//! validate -> normalize -> enrich -> classify -> policy-evaluate -> act.
//!
//! Events flow from a bounded ingress queue through a worker pool; each
//! event is owned by exactly one worker from validation through action
//! execution. Shared structures (catalog snapshot, detector set, connector
//! registry) are read-mostly and swapped atomically by their owners.

pub mod orchestrator;
pub mod queue;
pub mod stages;
pub mod stores;

pub use orchestrator::{PipelineOrchestrator, PipelineStats, RegistrySiemForwarder};
pub use queue::PipelineServer;
pub use stores::{EventQuery, EventStore, GeoProvider, MemoryEventStore, StaticGeoProvider};

use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// The event failed validation and was dropped
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// The ingress queue is full; the event was rejected at the front door
    #[error("Pipeline overloaded, event rejected")]
    Overloaded,

    /// The event crossed its processing deadline
    #[error("Event deadline exceeded in stage {stage}")]
    DeadlineExceeded { stage: &'static str },

    /// Persistence failed after processing
    #[error("Storage error: {message}")]
    StorageError { message: String },

    /// Unrecoverable internal state
    #[error("Internal pipeline error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn storage_error<S: Into<String>>(message: S) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::ValidationError { .. } => "validation",
            PipelineError::Overloaded => "overloaded",
            PipelineError::DeadlineExceeded { .. } => "deadline",
            PipelineError::StorageError { .. } => "storage",
            PipelineError::Internal { .. } => "internal",
        }
    }
}
