// =====================================================================================
// File: core-detection/src/classifier.rs
// Description: Classification engine combining detectors into an ordered hit vector
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::detectors::DetectorRegistry;
use core_events::ClassificationHit;
use tracing::debug;

/// Fraction of the smaller span that must overlap before two hits are
/// considered duplicates of the same region.
const OVERLAP_MERGE_THRESHOLD: f64 = 0.5;

/// Content classifier.
///
/// Runs every enabled detector over the payload, merges overlapping spans
/// (keeping the highest-confidence hit), drops hits below the configured
/// confidence floor, and returns the vector ordered by span start.
pub struct Classifier {
    registry: DetectorRegistry,
    min_confidence: f64,
}

impl Classifier {
    pub fn new(registry: DetectorRegistry, min_confidence: f64) -> Self {
        Self {
            registry,
            min_confidence,
        }
    }

    /// Classifier with the built-in detectors and the default 0.5 floor
    pub fn with_defaults() -> Self {
        Self::new(DetectorRegistry::with_defaults(), 0.5)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Classify the content into an ordered hit vector
    pub fn classify(&self, content: &str) -> Vec<ClassificationHit> {
        let raw = self.registry.detect_all(content);
        let total = raw.len();

        let mut filtered: Vec<ClassificationHit> = raw
            .into_iter()
            .filter(|hit| hit.confidence >= self.min_confidence)
            .collect();

        // Resolve overlapping spans highest-confidence-first so the winner of
        // any contested region is deterministic.
        filtered.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.span.begin.cmp(&b.span.begin))
        });

        let mut kept: Vec<ClassificationHit> = Vec::with_capacity(filtered.len());
        for candidate in filtered {
            let duplicate = kept.iter().any(|existing| {
                let overlap = existing.span.overlap(&candidate.span);
                let smaller = existing.span.len().min(candidate.span.len()).max(1);
                (overlap as f64 / smaller as f64) > OVERLAP_MERGE_THRESHOLD
            });
            if !duplicate {
                kept.push(candidate);
            }
        }

        kept.sort_by_key(|hit| hit.span.begin);

        debug!(
            raw_hits = total,
            kept_hits = kept.len(),
            floor = self.min_confidence,
            "Content classified"
        );

        kept
    }
}
