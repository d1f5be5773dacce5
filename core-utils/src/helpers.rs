// =====================================================================================
// File: core-utils/src/helpers.rs
// Description: Helper functions and utilities for SentinelDLP platform
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use serde::{Deserialize, Serialize};

/// Marker appended to text fields shortened by [`truncate_text`].
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Truncate a text field to at most `max_chars` characters, appending a
/// truncation marker when anything was cut. Returns the (possibly shortened)
/// text and whether truncation happened.
pub fn truncate_text(value: &str, max_chars: usize) -> (String, bool) {
    if value.chars().count() <= max_chars {
        return (value.to_string(), false);
    }
    let kept: String = value.chars().take(max_chars).collect();
    (format!("{}{}", kept, TRUNCATION_MARKER), true)
}

/// Pagination parameters for query interfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: Option<u64>,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),                // Ensure page is at least 1
            per_page: per_page.clamp(1, 1000),
            total: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

/// Shannon entropy of a string in bits per character.
///
/// Used to separate genuine secrets from low-entropy token-shaped text.
pub fn shannon_entropy(value: &str) -> f64 {
    if value.is_empty() {
        return 0.0;
    }
    let mut counts = std::collections::HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
    }
    let len = value.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_short_input() {
        let (text, truncated) = truncate_text("hello", 10);
        assert_eq!(text, "hello");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_text_long_input() {
        let (text, truncated) = truncate_text("abcdefghij", 4);
        assert_eq!(text, format!("abcd{}", TRUNCATION_MARKER));
        assert!(truncated);
    }

    #[test]
    fn test_pagination_bounds() {
        let pagination = Pagination::new(0, 5000);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 1000);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn test_shannon_entropy() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        // Random-looking secrets sit well above repetitive text
        assert!(shannon_entropy("f3A9xQ72LpZc8VbN1dYw") > 3.0);
        assert!(shannon_entropy("aaaaaaaaaabbbbbbbbbb") < 1.5);
    }
}
