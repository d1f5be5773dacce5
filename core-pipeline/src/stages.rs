// =====================================================================================
// File: core-pipeline/src/stages.rs
// Description: Validation, normalization, and enrichment stages
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::stores::GeoProvider;
use crate::{PipelineError, PipelineResult};
use core_config::PipelineConfig;
use core_events::{AgentInfo, DlpEvent, EventDescriptor, EventType, RawEvent, Severity};
use core_utils::{truncate_text, Validate, ValidationError};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on the opaque event id accepted at ingress
const MAX_EVENT_ID_LEN: usize = 256;

/// Stage 1: validate the raw submission and construct the canonical event.
///
/// Required fields: `event_id`, `timestamp`, `agent.id`, `event.type`.
/// Content larger than `max_content_size` is rejected outright. Every
/// problem is collected so the rejection names all of them at once.
pub fn validate(raw: RawEvent, config: &PipelineConfig) -> PipelineResult<DlpEvent> {
    let mut errors = ValidationError::new();

    let event_id = raw.event_id.unwrap_or_default();
    errors.collect(Validate::not_empty(&event_id, "event_id"));
    errors.collect(Validate::length(
        &event_id,
        "event_id",
        None,
        Some(MAX_EVENT_ID_LEN),
    ));

    if raw.timestamp.is_none() {
        errors.add_error("timestamp", "is required");
    }

    let raw_agent = raw.agent.unwrap_or_default();
    let agent_id = raw_agent.id.unwrap_or_default();
    errors.collect(Validate::not_empty(&agent_id, "agent.id"));

    let descriptor = raw.event.unwrap_or_default();
    let kind = descriptor.kind.unwrap_or_default();
    errors.collect(Validate::not_empty(&kind, "event.type"));

    let content = raw.content.unwrap_or_default();
    if content.len() > config.max_content_size {
        errors.add_error(
            "content",
            &format!(
                "size {} exceeds limit {}",
                content.len(),
                config.max_content_size
            ),
        );
    }

    if let Err(errors) = errors.into_result() {
        return Err(PipelineError::validation_error(errors.to_string()));
    }
    let timestamp = raw
        .timestamp
        .ok_or_else(|| PipelineError::validation_error("timestamp is required"))?;

    Ok(DlpEvent {
        event_id,
        timestamp,
        agent: AgentInfo {
            id: agent_id,
            name: raw_agent.name,
            hostname: raw_agent.hostname,
            ip: raw_agent.ip,
            os: raw_agent.os,
            metadata: raw_agent.metadata,
        },
        user: raw.user.unwrap_or_default(),
        network: raw.network.unwrap_or_default(),
        file: raw.file.unwrap_or_default(),
        event: EventDescriptor {
            kind: EventType::from(kind),
            severity: descriptor
                .severity
                .map(|s| Severity::parse_lenient(&s))
                .unwrap_or(Severity::Medium),
            day_of_week: None,
        },
        content,
        metadata: raw.metadata.unwrap_or_default(),
        classification: Vec::new(),
        policy_matches: Vec::new(),
        actions_executed: None,
        blocked: false,
        truncated: false,
        labels: Vec::new(),
    })
}

/// Stage 2: normalize field shapes.
///
/// Enum-like fields were lowercased during validation parsing; optional
/// containers already exist as empty records. What remains is bounding
/// open-ended text: oversized metadata strings are truncated and the event
/// is marked.
pub fn normalize(event: &mut DlpEvent, config: &PipelineConfig) {
    // Timestamps are carried as UTC instants from the moment they parse
    let limit = config.max_text_field_chars;

    for value in event.metadata.values_mut() {
        if let serde_json::Value::String(text) = value {
            let (shortened, truncated) = truncate_text(text, limit);
            if truncated {
                *text = shortened;
                event.truncated = true;
            }
        }
    }

    if let Some(path) = &event.file.path {
        let (shortened, truncated) = truncate_text(path, limit);
        if truncated {
            event.file.path = Some(shortened);
            event.truncated = true;
        }
    }

    if event.truncated {
        debug!(event_id = %event.event_id, "Oversized text fields truncated");
    }
}

/// Stage 3: enrich with derived fields.
///
/// Derives the day of week, resolves the destination country when a geo
/// provider is configured, and lifts policy-agnostic labels off the agent
/// enrollment metadata.
pub async fn enrich(event: &mut DlpEvent, geo: Option<&Arc<dyn GeoProvider>>) {
    event.event.day_of_week = Some(
        event
            .timestamp
            .format("%A")
            .to_string()
            .to_lowercase(),
    );

    if event.network.destination_country.is_none() {
        if let (Some(provider), Some(destination_ip)) = (geo, event.network.destination_ip.clone())
        {
            event.network.destination_country = provider.lookup_country(&destination_ip).await;
        }
    }

    if let Some(labels) = event.agent.metadata.get("labels") {
        for label in labels.split(',') {
            let label = label.trim();
            if !label.is_empty() && !event.labels.iter().any(|l| l == label) {
                event.labels.push(label.to_string());
            }
        }
    }
}
