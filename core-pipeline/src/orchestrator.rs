// =====================================================================================
// File: core-pipeline/src/orchestrator.rs
// Description: Per-event six-stage orchestration
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::stages;
use crate::stores::{EventStore, GeoProvider};
use crate::{PipelineError, PipelineResult};
use async_trait::async_trait;
use core_actions::{ActionExecResult, ActionExecutor, SiemForwarder};
use core_config::PipelineConfig;
use core_detection::Classifier;
use core_events::{DlpEvent, RawEvent};
use core_observability::PipelineMetrics;
use core_policy::{CatalogService, RuleEvaluator};
use core_siem::SiemRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Running pipeline counters, surfaced on the admin interface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub processed: u64,
    pub rejected: u64,
    pub blocked: u64,
    pub stage_timeouts: u64,
    pub act_timeouts: u64,
}

/// Sequences the six stages for one event.
///
/// Shared dependencies are injected at construction; the orchestrator holds
/// them immutably and never reaches for process-level globals.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    classifier: Arc<Classifier>,
    catalog: Arc<CatalogService>,
    executor: Arc<ActionExecutor>,
    store: Arc<dyn EventStore>,
    geo: Option<Arc<dyn GeoProvider>>,
    metrics: Option<Arc<PipelineMetrics>>,
    stats: RwLock<PipelineStats>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        classifier: Arc<Classifier>,
        catalog: Arc<CatalogService>,
        executor: Arc<ActionExecutor>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            config,
            classifier,
            catalog,
            executor,
            store,
            geo: None,
            metrics: None,
            stats: RwLock::new(PipelineStats::default()),
        }
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoProvider>) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }

    /// Process one raw event through all six stages.
    ///
    /// Stage order within the event is strictly sequential. CPU-bound stages
    /// that overrun their soft budget mark the event and continue; an `act`
    /// overrun abandons the remaining actions with a logged error. Validation
    /// failure drops the event.
    pub async fn process(&self, raw: RawEvent) -> PipelineResult<DlpEvent> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.event_deadline_ms);

        // Stage 1: validate
        let stage_start = Instant::now();
        let mut event = match stages::validate(raw, &self.config) {
            Ok(event) => event,
            Err(e) => {
                self.stats.write().await.rejected += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.events_rejected_total.inc();
                }
                warn!(error = %e, "Event rejected during validation");
                return Err(e);
            }
        };
        self.observe_stage("validate", stage_start, &mut event).await;

        // Stage 2: normalize
        let stage_start = Instant::now();
        stages::normalize(&mut event, &self.config);
        self.observe_stage("normalize", stage_start, &mut event).await;

        // Stage 3: enrich (may touch the geo provider)
        let stage_start = Instant::now();
        self.check_deadline(deadline, "enrich")?;
        let enrich_budget = self.remaining(
            deadline,
            Duration::from_millis(self.config.enrich_timeout_ms),
        );
        if tokio::time::timeout(enrich_budget, stages::enrich(&mut event, self.geo.as_ref()))
            .await
            .is_err()
        {
            self.mark_partial(&mut event, "enrich").await;
        }
        self.observe_stage("enrich", stage_start, &mut event).await;

        // Stage 4: classify
        let stage_start = Instant::now();
        self.check_deadline(deadline, "classify")?;
        event.classification = self.classifier.classify(&event.content);
        if let Some(metrics) = &self.metrics {
            for hit in &event.classification {
                metrics.record_detection(&hit.hit_type);
            }
        }
        self.observe_stage("classify", stage_start, &mut event).await;

        // Stage 5: policy evaluation against the current snapshot
        let stage_start = Instant::now();
        self.check_deadline(deadline, "evaluate")?;
        let snapshot = self.catalog.snapshot().await;
        let outcome = RuleEvaluator::evaluate(&event, &snapshot);
        event.policy_matches = outcome.matches.clone();
        if let Some(metrics) = &self.metrics {
            for matched in &event.policy_matches {
                metrics.record_policy_violation(&matched.policy_id, matched.severity.as_str());
            }
        }
        self.observe_stage("evaluate", stage_start, &mut event).await;

        // Stage 6: act
        let stage_start = Instant::now();
        self.check_deadline(deadline, "act")?;
        let matches = event.policy_matches.clone();
        if !matches.is_empty() {
            let act_budget = self.remaining(
                deadline,
                Duration::from_millis(self.config.act_timeout_ms),
            );
            match tokio::time::timeout(
                act_budget,
                self.executor.execute_plan(&mut event, &matches),
            )
            .await
            {
                Ok(summary) => {
                    if let Some(metrics) = &self.metrics {
                        for result in &summary.actions_executed {
                            metrics.record_action(result.action_type.as_str(), result.success);
                        }
                    }
                    event.actions_executed = Some(summary);
                }
                Err(_) => {
                    // Remaining actions are abandoned; the event still closes
                    error!(
                        event_id = %event.event_id,
                        "Act stage timed out, abandoning remaining actions"
                    );
                    self.stats.write().await.act_timeouts += 1;
                    event
                        .metadata
                        .insert("actions_timed_out".to_string(), serde_json::json!(true));
                }
            }
        }
        self.observe_stage("act", stage_start, &mut event).await;

        // Close and persist
        self.store.append(&event).await?;

        let mut stats = self.stats.write().await;
        stats.processed += 1;
        if event.blocked {
            stats.blocked += 1;
        }
        drop(stats);

        if let Some(metrics) = &self.metrics {
            metrics.record_event_processed(event.event.kind.as_str(), "completed");
            if event.blocked {
                metrics.events_blocked_total.inc();
            }
            metrics
                .event_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        info!(
            event_id = %event.event_id,
            event_type = %event.event.kind,
            hits = event.classification.len(),
            matches = event.policy_matches.len(),
            blocked = event.blocked,
            duration_ms = started.elapsed().as_millis() as u64,
            "Event processed"
        );

        Ok(event)
    }

    fn check_deadline(&self, deadline: Instant, stage: &'static str) -> PipelineResult<()> {
        if Instant::now() >= deadline {
            Err(PipelineError::DeadlineExceeded { stage })
        } else {
            Ok(())
        }
    }

    fn remaining(&self, deadline: Instant, budget: Duration) -> Duration {
        deadline
            .saturating_duration_since(Instant::now())
            .min(budget)
    }

    async fn mark_partial(&self, event: &mut DlpEvent, stage: &str) {
        warn!(event_id = %event.event_id, stage = stage, "Stage overran its budget");
        self.stats.write().await.stage_timeouts += 1;
        let list = event
            .metadata
            .entry("partial_stages".to_string())
            .or_insert_with(|| serde_json::json!([]));
        if let Some(list) = list.as_array_mut() {
            list.push(serde_json::json!(stage));
        }
    }

    /// Record the stage duration; CPU-bound stages that overran their soft
    /// budget mark the event rather than aborting it.
    async fn observe_stage(&self, stage: &'static str, started: Instant, event: &mut DlpEvent) {
        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_stage(stage, elapsed.as_secs_f64());
        }
        let budget = Duration::from_millis(match stage {
            "validate" => self.config.validate_timeout_ms,
            "normalize" => self.config.normalize_timeout_ms,
            "enrich" => self.config.enrich_timeout_ms,
            "classify" => self.config.classify_timeout_ms,
            "evaluate" => self.config.evaluate_timeout_ms,
            _ => self.config.act_timeout_ms,
        });
        if elapsed > budget && stage != "enrich" && stage != "act" {
            self.mark_partial(event, stage).await;
        }
        debug!(stage = stage, elapsed_us = elapsed.as_micros() as u64, "Stage completed");
    }
}

/// Bridges the executor's forward-to-SIEM seam onto the connector registry
pub struct RegistrySiemForwarder {
    registry: Arc<SiemRegistry>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl RegistrySiemForwarder {
    pub fn new(registry: Arc<SiemRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl SiemForwarder for RegistrySiemForwarder {
    async fn forward(&self, event: &DlpEvent) -> ActionExecResult<HashMap<String, bool>> {
        let results = self.registry.send_event_to_all(event, None).await;
        if let Some(metrics) = &self.metrics {
            for (connector, success) in &results {
                metrics.record_siem_forward(connector, *success);
            }
        }
        Ok(results)
    }
}
