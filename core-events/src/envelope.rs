// =====================================================================================
// File: core-events/src/envelope.rs
// Description: Common event envelope forwarded to SIEM sinks
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::DlpEvent;
use serde_json::{json, Map, Value};

/// Wire value of the envelope `event_type` field
pub const SIEM_EVENT_TYPE: &str = "dlp_incident";

/// Common envelope emitted to every SIEM sink.
///
/// Sinks may flatten or reshape it; the envelope itself is sink-agnostic.
/// Empty nested objects and null-valued leaves are pruned before
/// transmission.
#[derive(Debug, Clone)]
pub struct SiemEnvelope {
    value: Value,
}

impl SiemEnvelope {
    /// Build the envelope for one processed event
    pub fn from_event(event: &DlpEvent, source: &str) -> Self {
        // The dlp subtree summarizes the strongest classification and the
        // first policy decision; the full detail stays in the event store.
        let top_hit = event
            .classification
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        let first_match = event.policy_matches.first();

        let actions: Vec<Value> = event
            .actions_executed
            .as_ref()
            .map(|summary| {
                summary
                    .actions_executed
                    .iter()
                    .map(|r| Value::String(r.action_type.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let raw = json!({
            "timestamp": event.timestamp.to_rfc3339(),
            "event_id": event.event_id,
            "event_type": SIEM_EVENT_TYPE,
            "source": source,
            "severity": event.event.severity.as_str(),
            "agent": {
                "id": event.agent.id,
                "name": event.agent.name,
                "hostname": event.agent.hostname,
                "ip": event.agent.ip,
                "os": event.agent.os,
            },
            "dlp": {
                "classification_type": top_hit.map(|h| h.hit_type.clone()),
                "confidence": top_hit.map(|h| h.confidence),
                "blocked": event.blocked,
                "policy_id": first_match.map(|m| m.policy_id.clone()),
                "policy_name": first_match.map(|m| m.policy_name.clone()),
                "rule_id": first_match.map(|m| m.rule_id.clone()),
            },
            "user": {
                "username": event.user.username,
                "domain": event.user.domain,
                "email": event.user.email,
            },
            "network": {
                "source_ip": event.network.source_ip,
                "destination_ip": event.network.destination_ip,
                "destination_host": event.network.destination_host,
                "destination_country": event.network.destination_country,
            },
            "file": {
                "name": event.file.name,
                "path": event.file.path,
                "size": event.file.size,
                "hash": event.file.hash,
                "type": event.file.file_type,
            },
            "actions": actions,
            "metadata": event.metadata,
        });

        Self {
            value: prune(raw).unwrap_or_else(|| Value::Object(Map::new())),
        }
    }

    /// The pruned JSON value transmitted to sinks
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Convenience accessor for the envelope timestamp, when present
    pub fn timestamp(&self) -> Option<&str> {
        self.value.get("timestamp").and_then(Value::as_str)
    }

    /// Hostname used by sinks that require a `host` field
    pub fn hostname(&self) -> Option<&str> {
        self.value
            .get("agent")
            .and_then(|a| a.get("hostname"))
            .and_then(Value::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.value.get("event_id").and_then(Value::as_str)
    }
}

/// Remove null leaves, then drop any nested object left without a single
/// non-null value. Arrays pass through with their elements pruned.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, nested)| prune(nested).map(|v| (key, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(prune).collect(),
        )),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassificationHit, EventType, Severity, Span};

    fn sample_event() -> DlpEvent {
        let mut event = DlpEvent::new("evt-001", "agent-001", EventType::Clipboard)
            .with_content("Payment with card: 4111111111111111")
            .with_severity(Severity::High);
        event.agent.hostname = Some("finance-laptop-01".to_string());
        event.classification.push(ClassificationHit {
            hit_type: "credit_card".to_string(),
            label: "Credit Card Number".to_string(),
            confidence: 0.95,
            pattern_id: "pan".to_string(),
            span: Span::new(19, 35),
            raw_match: None,
        });
        event
    }

    #[test]
    fn test_envelope_core_fields() {
        let envelope = SiemEnvelope::from_event(&sample_event(), "sentinel_dlp");
        let value = envelope.as_value();

        assert_eq!(value["event_type"], SIEM_EVENT_TYPE);
        assert_eq!(value["source"], "sentinel_dlp");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["dlp"]["classification_type"], "credit_card");
        assert_eq!(value["dlp"]["confidence"], 0.95);
        assert_eq!(envelope.hostname(), Some("finance-laptop-01"));
        assert_eq!(envelope.event_id(), Some("evt-001"));
    }

    #[test]
    fn test_envelope_prunes_empty_subtrees() {
        let event = DlpEvent::new("evt-002", "agent-001", EventType::File);
        let envelope = SiemEnvelope::from_event(&event, "sentinel_dlp");
        let value = envelope.as_value();

        // No user/network/file context was provided, so those subtrees vanish
        assert!(value.get("user").is_none());
        assert!(value.get("network").is_none());
        assert!(value.get("file").is_none());
        // blocked=false is a real value and must survive pruning
        assert_eq!(value["dlp"]["blocked"], false);
    }

    #[test]
    fn test_prune_recurses_into_nested_objects() {
        let raw = json!({
            "a": {"b": {"c": null}},
            "d": {"e": 1},
            "list": [null, 2, {"x": null}],
        });
        let cleaned = prune(raw).unwrap();
        assert!(cleaned.get("a").is_none());
        assert_eq!(cleaned["d"]["e"], 1);
        assert_eq!(cleaned["list"], json!([2]));
    }
}
