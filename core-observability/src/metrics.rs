// =====================================================================================
// File: core-observability/src/metrics.rs
// Description: Prometheus metrics for the DLP event pipeline
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::ObservabilityError;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Pipeline metrics for the DLP platform
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    registry: Registry,

    // Event flow
    pub events_processed_total: IntCounterVec,
    pub events_rejected_total: IntCounter,
    pub events_blocked_total: IntCounter,
    pub events_overloaded_total: IntCounter,

    // Detection
    pub sensitive_data_detected_total: IntCounterVec,

    // Policy engine
    pub policy_violations_total: IntCounterVec,

    // Actions
    pub actions_executed_total: IntCounterVec,

    // SIEM forwarding
    pub siem_events_forwarded_total: IntCounterVec,

    // Latency
    pub stage_duration_seconds: HistogramVec,
    pub event_duration_seconds: Histogram,
}

impl PipelineMetrics {
    /// Metrics registered against the default process-wide registry
    pub fn new() -> Result<Self, ObservabilityError> {
        let registry = prometheus::default_registry().clone();
        Self::with_registry(registry)
    }

    /// Metrics registered against a caller-supplied registry; used by tests
    /// to avoid collisions on the global registry
    pub fn with_registry(registry: Registry) -> Result<Self, ObservabilityError> {
        fn metrics_err<E: std::fmt::Display>(e: E) -> ObservabilityError {
            ObservabilityError::Metrics(e.to_string())
        }

        let events_processed_total = IntCounterVec::new(
            Opts::new("dlp_events_processed_total", "Events processed by type and status"),
            &["event_type", "status"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(events_processed_total.clone()))
            .map_err(metrics_err)?;

        let events_rejected_total = IntCounter::new(
            "dlp_events_rejected_total",
            "Events rejected during validation",
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(events_rejected_total.clone()))
            .map_err(metrics_err)?;

        let events_blocked_total =
            IntCounter::new("dlp_events_blocked_total", "Events blocked by policy")
                .map_err(metrics_err)?;
        registry
            .register(Box::new(events_blocked_total.clone()))
            .map_err(metrics_err)?;

        let events_overloaded_total = IntCounter::new(
            "dlp_events_overloaded_total",
            "Events rejected because the ingress queue was full",
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(events_overloaded_total.clone()))
            .map_err(metrics_err)?;

        let sensitive_data_detected_total = IntCounterVec::new(
            Opts::new(
                "dlp_sensitive_data_detected_total",
                "Classification hits by detection type",
            ),
            &["detection_type"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(sensitive_data_detected_total.clone()))
            .map_err(metrics_err)?;

        let policy_violations_total = IntCounterVec::new(
            Opts::new(
                "dlp_policy_violations_total",
                "Policy matches by policy and severity",
            ),
            &["policy_id", "severity"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(policy_violations_total.clone()))
            .map_err(metrics_err)?;

        let actions_executed_total = IntCounterVec::new(
            Opts::new(
                "dlp_actions_executed_total",
                "Actions executed by type and status",
            ),
            &["action_type", "status"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(actions_executed_total.clone()))
            .map_err(metrics_err)?;

        let siem_events_forwarded_total = IntCounterVec::new(
            Opts::new(
                "dlp_siem_events_forwarded_total",
                "Events forwarded to SIEM sinks by connector and status",
            ),
            &["connector", "status"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(siem_events_forwarded_total.clone()))
            .map_err(metrics_err)?;

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dlp_stage_duration_seconds",
                "Per-stage processing duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["stage"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(stage_duration_seconds.clone()))
            .map_err(metrics_err)?;

        let event_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "dlp_event_duration_seconds",
                "End-to-end event processing duration",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(event_duration_seconds.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            registry,
            events_processed_total,
            events_rejected_total,
            events_blocked_total,
            events_overloaded_total,
            sensitive_data_detected_total,
            policy_violations_total,
            actions_executed_total,
            siem_events_forwarded_total,
            stage_duration_seconds,
            event_duration_seconds,
        })
    }

    pub fn record_event_processed(&self, event_type: &str, status: &str) {
        self.events_processed_total
            .with_label_values(&[event_type, status])
            .inc();
    }

    pub fn record_stage(&self, stage: &str, seconds: f64) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(seconds);
    }

    pub fn record_detection(&self, detection_type: &str) {
        self.sensitive_data_detected_total
            .with_label_values(&[detection_type])
            .inc();
    }

    pub fn record_policy_violation(&self, policy_id: &str, severity: &str) {
        self.policy_violations_total
            .with_label_values(&[policy_id, severity])
            .inc();
    }

    pub fn record_action(&self, action_type: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.actions_executed_total
            .with_label_values(&[action_type, status])
            .inc();
    }

    pub fn record_siem_forward(&self, connector: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.siem_events_forwarded_total
            .with_label_values(&[connector, status])
            .inc();
    }

    /// Export metrics in the Prometheus text format
    pub fn export_metrics(&self) -> Result<String, ObservabilityError> {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .map_err(|e| ObservabilityError::Metrics(e.to_string()))
    }
}
