// =====================================================================================
// File: core-events/src/event.rs
// Description: Security event types and canonical event shape
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::{ExecutionSummary, PolicyMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event severity levels (ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    /// Parse a severity string, defaulting to `Medium` for unknown values
    pub fn parse_lenient(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "info" => Severity::Info,
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// The next severity up, saturating at critical
    pub fn escalated(&self) -> Self {
        match self {
            Severity::Info => Severity::Low,
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of endpoint activity that produced the event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    File,
    Clipboard,
    Usb,
    Network,
    Print,
    Screenshot,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::File => "file",
            EventType::Clipboard => "clipboard",
            EventType::Usb => "usb",
            EventType::Network => "network",
            EventType::Print => "print",
            EventType::Screenshot => "screenshot",
            EventType::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "file" => EventType::File,
            "clipboard" => EventType::Clipboard,
            "usb" => EventType::Usb,
            "network" => EventType::Network,
            "print" => EventType::Print,
            "screenshot" => EventType::Screenshot,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Endpoint agent identity attached to every event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Free-form labels shipped with agent enrollment
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// User context, when the agent could resolve one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Network context for network-bound events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_country: Option<String>,
}

/// File context for file-bound events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// Nested `event` descriptor, matching the wire shape agents submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescriptor {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub severity: Severity,
    /// Derived during enrichment, e.g. `monday`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
}

/// One detector hit over the event content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationHit {
    /// Detector type, e.g. `credit_card`
    #[serde(rename = "type")]
    pub hit_type: String,
    /// Human-readable label, e.g. `Credit Card Number`
    pub label: String,
    /// Detector confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Identifier of the pattern that produced the hit
    pub pattern_id: String,
    /// Byte span of the match within the content
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_match: Option<String>,
}

/// Half-open byte range `[begin, end)` within event content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Length of the intersection with another span
    pub fn overlap(&self, other: &Span) -> usize {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        end.saturating_sub(begin)
    }
}

/// Raw event as submitted by an agent, before validation.
///
/// Every field is optional; the validation stage decides which absences are
/// fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub agent: Option<RawAgent>,
    pub event: Option<RawEventDescriptor>,
    pub user: Option<UserInfo>,
    pub network: Option<NetworkInfo>,
    pub file: Option<FileInfo>,
    pub content: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAgent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub os: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEventDescriptor {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub severity: Option<String>,
}

/// Canonical DLP event flowing through the pipeline.
///
/// Constructed by the validation stage, mutated only by the stage currently
/// holding it, and immutable once the action stage completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlpEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent: AgentInfo,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub network: NetworkInfo,
    #[serde(default)]
    pub file: FileInfo,
    pub event: EventDescriptor,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    // Derived fields, populated as the event moves through the pipeline
    #[serde(default)]
    pub classification: Vec<ClassificationHit>,
    #[serde(default)]
    pub policy_matches: Vec<PolicyMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_executed: Option<ExecutionSummary>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub truncated: bool,
    /// Policy-agnostic labels attached during enrichment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl DlpEvent {
    /// Construct a minimal event; used by ingress shims and tests
    pub fn new(event_id: impl Into<String>, agent_id: impl Into<String>, kind: EventType) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: Utc::now(),
            agent: AgentInfo {
                id: agent_id.into(),
                ..AgentInfo::default()
            },
            user: UserInfo::default(),
            network: NetworkInfo::default(),
            file: FileInfo::default(),
            event: EventDescriptor {
                kind,
                severity: Severity::Medium,
                day_of_week: None,
            },
            content: String::new(),
            metadata: HashMap::new(),
            classification: Vec::new(),
            policy_matches: Vec::new(),
            actions_executed: None,
            blocked: false,
            truncated: false,
            labels: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.event.severity = severity;
        self
    }

    pub fn with_file(mut self, file: FileInfo) -> Self {
        self.file = file;
        self
    }

    /// Serialize into the JSON tree policy conditions resolve against
    pub fn to_value(&self) -> crate::EventResult<serde_json::Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::Critical.escalated(), Severity::Critical);
        assert_eq!(Severity::Medium.escalated(), Severity::High);
    }

    #[test]
    fn test_severity_lenient_parse() {
        assert_eq!(Severity::parse_lenient("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("bogus"), Severity::Medium);
    }

    #[test]
    fn test_event_type_roundtrip() {
        let kind: EventType = "Clipboard".to_string().into();
        assert_eq!(kind, EventType::Clipboard);

        let other: EventType = "browser".to_string().into();
        assert_eq!(other, EventType::Other("browser".to_string()));
        assert_eq!(other.as_str(), "browser");
    }

    #[test]
    fn test_event_serializes_wire_shape() {
        let event = DlpEvent::new("evt-001", "agent-001", EventType::Clipboard)
            .with_content("hello")
            .with_severity(Severity::High);

        let value = event.to_value().unwrap();
        assert_eq!(value["event"]["type"], "clipboard");
        assert_eq!(value["event"]["severity"], "high");
        assert_eq!(value["agent"]["id"], "agent-001");
        assert_eq!(value["blocked"], false);
    }

    #[test]
    fn test_span_overlap() {
        let a = Span::new(0, 10);
        let b = Span::new(5, 15);
        let c = Span::new(12, 20);
        assert_eq!(a.overlap(&b), 5);
        assert_eq!(a.overlap(&c), 0);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn test_raw_event_accepts_partial_payload() {
        let raw: RawEvent = serde_json::from_str(r#"{"event_id": "evt-1"}"#).unwrap();
        assert_eq!(raw.event_id.as_deref(), Some("evt-1"));
        assert!(raw.agent.is_none());
        assert!(raw.content.is_none());
    }
}
