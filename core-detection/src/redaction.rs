// =====================================================================================
// File: core-detection/src/redaction.rs
// Description: Span redaction over classified content
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use core_events::{ClassificationHit, RedactionMethod, Span};
use sha2::{Digest, Sha256};

/// Placeholder written over fully redacted spans
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Number of hash characters kept in `hash` mode replacements
const HASH_PREFIX_LEN: usize = 16;

/// Redacts classified spans out of event content.
///
/// Redaction never reveals the original match: every mode replaces the span
/// with a derivative that does not contain it.
pub struct Redactor;

impl Redactor {
    /// Redact every hit span in `content` using the given method.
    ///
    /// Overlapping spans are unioned before replacement so the output is
    /// well-formed regardless of the hit vector's shape.
    pub fn redact(content: &str, hits: &[ClassificationHit], method: RedactionMethod) -> String {
        let spans = Self::merged_spans(content, hits);
        if spans.is_empty() {
            return content.to_string();
        }

        let mut output = String::with_capacity(content.len());
        let mut cursor = 0usize;
        for span in &spans {
            output.push_str(&content[cursor..span.begin]);
            output.push_str(&Self::replacement(&content[span.begin..span.end], method));
            cursor = span.end;
        }
        output.push_str(&content[cursor..]);
        output
    }

    fn replacement(original: &str, method: RedactionMethod) -> String {
        match method {
            RedactionMethod::Full => REDACTED_PLACEHOLDER.to_string(),
            RedactionMethod::Partial | RedactionMethod::MaskExceptLast4 => {
                let chars: Vec<char> = original.chars().collect();
                if chars.len() <= 4 {
                    "*".repeat(chars.len())
                } else {
                    let visible: String = chars[chars.len() - 4..].iter().collect();
                    format!("{}{}", "*".repeat(chars.len() - 4), visible)
                }
            }
            RedactionMethod::MaskExceptFirst4 => {
                let chars: Vec<char> = original.chars().collect();
                if chars.len() <= 4 {
                    "*".repeat(chars.len())
                } else {
                    let visible: String = chars[..4].iter().collect();
                    format!("{}{}", visible, "*".repeat(chars.len() - 4))
                }
            }
            RedactionMethod::Hash => {
                let digest = Sha256::digest(original.as_bytes());
                let hex = hex::encode(digest);
                format!("[SHA256:{}]", &hex[..HASH_PREFIX_LEN])
            }
        }
    }

    /// Clamp hit spans to the content, snap to char boundaries, drop empties,
    /// and union overlapping or adjacent ranges.
    fn merged_spans(content: &str, hits: &[ClassificationHit]) -> Vec<Span> {
        let mut spans: Vec<Span> = hits
            .iter()
            .map(|hit| {
                let begin = clamp_boundary(content, hit.span.begin.min(content.len()));
                let end = clamp_boundary(content, hit.span.end.min(content.len()));
                Span::new(begin, end)
            })
            .filter(|span| !span.is_empty())
            .collect();

        spans.sort_by_key(|span| span.begin);

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.begin <= last.end => {
                    last.end = last.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }
        merged
    }
}

fn clamp_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
