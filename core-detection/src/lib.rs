// =====================================================================================
// File: core-detection/src/lib.rs
// Description: Sensitive data detection and classification engine
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! # Core Detection Module
//!
//! Content inspection for the DLP pipeline:
//! - Pluggable detector library (payment cards, national ids, emails, phone
//!   numbers, API keys and secrets, passwords in context)
//! - Classifier that merges overlapping hits and enforces a confidence floor
//! - Redaction of classified spans in several masking modes

pub mod classifier;
pub mod detectors;
pub mod redaction;

pub use classifier::Classifier;
pub use detectors::{
    ApiKeyDetector, ContextHint, CreditCardDetector, Detector, DetectorRegistry, EmailDetector,
    NationalIdDetector, PasswordDetector, PatternDetector, PhoneDetector,
};
pub use redaction::Redactor;

use thiserror::Error;

/// Result type alias for detection operations
pub type DetectionResult<T> = Result<T, DetectionError>;

/// Detection engine errors
#[derive(Error, Debug, Clone)]
pub enum DetectionError {
    /// A detector registration carried a pattern that does not compile
    #[error("Invalid pattern for detector {detector}: {message}")]
    InvalidPattern { detector: String, message: String },

    /// A detector id was registered twice
    #[error("Duplicate detector id: {0}")]
    DuplicateDetector(String),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl DetectionError {
    pub fn invalid_pattern<S: Into<String>>(detector: S, message: S) -> Self {
        Self::InvalidPattern {
            detector: detector.into(),
            message: message.into(),
        }
    }

    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}
