// =====================================================================================
// File: core-utils/src/lib.rs
// Description: Utility functions and testing tools for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

pub mod fixtures;
pub mod helpers;
pub mod testing;
pub mod validation;

pub use fixtures::*;
pub use helpers::*;
pub use testing::*;
pub use validation::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Utility error types
#[derive(Error, Debug)]
pub enum UtilError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

/// Common result type for utilities
pub type UtilResult<T> = Result<T, UtilError>;

/// Format the current timestamp in ISO 8601 format
pub fn format_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp into a UTC instant
pub fn parse_timestamp(timestamp: &str) -> UtilResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UtilError::ProcessingError(format!("Failed to parse timestamp: {}", e)))
}

/// Generate a unique identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a short unique identifier (8 characters)
pub fn generate_short_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let timestamp = format_timestamp();
        assert!(timestamp.contains('T'));
        // RFC3339 format may end with 'Z' or '+00:00' for UTC
        assert!(timestamp.ends_with('Z') || timestamp.ends_with("+00:00"));
    }

    #[test]
    fn test_parse_timestamp_roundtrip() {
        let original = format_timestamp();
        let parsed = parse_timestamp(&original).unwrap();
        assert_eq!(parsed.to_rfc3339(), original);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(generate_short_id().len(), 8);
    }
}
