// =====================================================================================
// File: core-policy/src/lib.rs
// Description: Declarative policy catalog and rule evaluation engine
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core Policy Module
//!
//! The administrator-defined policy catalog and its evaluation engine:
//! - YAML policy files loaded from a directory, validated and compiled once
//! - Immutable catalog snapshots with atomic hot reload
//! - Priority-ordered rule evaluation with short-circuit semantics

pub mod catalog;
pub mod evaluator;
pub mod model;

pub use catalog::{CatalogService, LoadReport, PolicyCatalog, SkippedFile};
pub use evaluator::{EvaluationOutcome, RuleEvaluator};
pub use model::{Condition, ConditionOperator, Policy, RawPolicyFile, Rule};

use thiserror::Error;

/// Result type alias for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Policy engine errors
#[derive(Error, Debug, Clone)]
pub enum PolicyError {
    /// Policy file could not be read
    #[error("IO error reading {path}: {message}")]
    IoError { path: String, message: String },

    /// Policy file is not valid YAML
    #[error("Parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    /// Policy structure failed validation
    #[error("Validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    /// A regex condition value does not compile
    #[error("Pattern error for {key}: {message}")]
    PatternError { key: String, message: String },

    /// Condition evaluation failed at runtime
    #[error("Evaluation error: {message}")]
    EvaluationError { message: String },
}

impl PolicyError {
    pub fn io_error<S: Into<String>>(path: S, message: S) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_error<S: Into<String>>(path: S, message: S) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation_error<S: Into<String>>(field: S, message: S) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn pattern_error<S: Into<String>>(key: S, message: S) -> Self {
        Self::PatternError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn evaluation_error<S: Into<String>>(message: S) -> Self {
        Self::EvaluationError {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self {
            PolicyError::IoError { .. } => "io",
            PolicyError::ParseError { .. } => "parse",
            PolicyError::ValidationError { .. } => "validation",
            PolicyError::PatternError { .. } => "pattern",
            PolicyError::EvaluationError { .. } => "evaluation",
        }
    }
}
