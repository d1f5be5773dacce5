// =====================================================================================
// File: core-utils/src/validation.rs
// Description: Validation utilities for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Validation error with field-specific messages.
///
/// Accumulates every problem found in one pass so callers can report a
/// complete rejection reason instead of the first failure only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self {
            errors: HashMap::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(Vec::new)
            .push(message.to_string());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (field, messages) in other.errors {
            for message in messages {
                self.add_error(&field, &message);
            }
        }
    }

    /// Fold a single-check result into the accumulator
    pub fn collect(&mut self, result: ValidationResult) {
        if let Err(error) = result {
            self.merge(error);
        }
    }

    pub fn into_result(self) -> ValidationResult {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut messages: Vec<String> = self
            .errors
            .iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |error| format!("{}: {}", field, error))
            })
            .collect();
        messages.sort();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// Common validation functions
pub struct Validate;

impl Validate {
    /// Validate that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> ValidationResult {
        if value.trim().is_empty() {
            let mut error = ValidationError::new();
            error.add_error(field, "is required");
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Validate string length
    pub fn length(
        value: &str,
        field: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> ValidationResult {
        let len = value.len();
        let mut error = ValidationError::new();

        if let Some(min_len) = min {
            if len < min_len {
                error.add_error(
                    field,
                    &format!("must be at least {} characters long", min_len),
                );
            }
        }

        if let Some(max_len) = max {
            if len > max_len {
                error.add_error(
                    field,
                    &format!("must be at most {} characters long", max_len),
                );
            }
        }

        if error.has_errors() {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Validate that a numeric value is within the inclusive range
    pub fn range_f64(value: f64, field: &str, min: f64, max: f64) -> ValidationResult {
        if value < min || value > max {
            let mut error = ValidationError::new();
            error.add_error(field, &format!("must be between {} and {}", min, max));
            Err(error)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty() {
        assert!(Validate::not_empty("value", "field").is_ok());
        assert!(Validate::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_length() {
        assert!(Validate::length("abcdef", "field", Some(3), Some(10)).is_ok());
        assert!(Validate::length("ab", "field", Some(3), None).is_err());
        assert!(Validate::length("abcdef", "field", None, Some(4)).is_err());
    }

    #[test]
    fn test_range() {
        assert!(Validate::range_f64(0.5, "confidence", 0.0, 1.0).is_ok());
        assert!(Validate::range_f64(1.5, "confidence", 0.0, 1.0).is_err());
    }

    #[test]
    fn test_collect_accumulates_across_checks() {
        let mut errors = ValidationError::new();
        errors.collect(Validate::not_empty("", "event_id"));
        errors.collect(Validate::not_empty("agent-001", "agent.id"));
        errors.collect(Validate::range_f64(2.0, "confidence", 0.0, 1.0));

        assert!(errors.has_errors());
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.clone().into_result().is_err());

        let clean = ValidationError::new();
        assert!(clean.into_result().is_ok());
    }

    #[test]
    fn test_error_merge_and_display() {
        let mut first = ValidationError::new();
        first.add_error("a", "is bad");
        let mut second = ValidationError::new();
        second.add_error("b", "is worse");
        first.merge(second);

        assert!(first.has_errors());
        assert_eq!(first.errors.len(), 2);
        let rendered = first.to_string();
        assert_eq!(rendered, "a: is bad, b: is worse");
    }
}
