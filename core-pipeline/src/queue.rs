// =====================================================================================
// File: core-pipeline/src/queue.rs
// Description: Bounded ingress queue and the pipeline worker pool
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::orchestrator::PipelineOrchestrator;
use crate::{PipelineError, PipelineResult};
use async_trait::async_trait;
use core_events::RawEvent;
use core_observability::{HealthCheck, HealthCheckResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Queue fill ratio above which the server reports degraded health
const DEGRADED_FILL_RATIO: f64 = 0.8;

/// Accepts raw events into a bounded queue and drains them through a pool
/// of workers, each owning one event from validation through action
/// execution.
pub struct PipelineServer {
    orchestrator: Arc<PipelineOrchestrator>,
    sender: mpsc::Sender<RawEvent>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl PipelineServer {
    /// Spawn the worker pool. Worker count comes from configuration, with
    /// the CPU count as the default.
    pub fn start(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        let capacity = orchestrator.config().queue_capacity;
        let worker_count = orchestrator
            .config()
            .workers
            .unwrap_or_else(num_cpus::get);

        let (sender, receiver) = mpsc::channel::<RawEvent>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let orchestrator = Arc::clone(&orchestrator);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    debug!(worker_id, "Pipeline worker started");
                    loop {
                        // Hold the receiver lock only for the dequeue itself
                        let next = { receiver.lock().await.recv().await };
                        match next {
                            Some(raw) => {
                                // Rejections and deadline misses are already
                                // counted and logged inside process()
                                if let Err(e) = orchestrator.process(raw).await {
                                    debug!(worker_id, error = %e, "Event not processed");
                                }
                            }
                            None => {
                                debug!(worker_id, "Ingress queue closed, worker exiting");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        info!(workers = worker_count, capacity, "Pipeline server started");

        Self {
            orchestrator,
            sender,
            workers,
            capacity,
        }
    }

    /// Submit an event at the front door. A full queue is an explicit
    /// `Overloaded` rejection, never a silent drop.
    pub fn try_submit(&self, raw: RawEvent) -> PipelineResult<()> {
        match self.sender.try_send(raw) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Ingress queue full, rejecting event");
                Err(PipelineError::Overloaded)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(PipelineError::internal("ingress queue closed"))
            }
        }
    }

    /// Events currently waiting in the queue
    pub fn queue_depth(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn orchestrator(&self) -> &Arc<PipelineOrchestrator> {
        &self.orchestrator
    }

    /// Stop accepting events and wait for the workers to drain the queue
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("Pipeline server stopped");
    }
}

#[async_trait]
impl HealthCheck for PipelineServer {
    fn name(&self) -> &str {
        "pipeline"
    }

    async fn check(&self) -> HealthCheckResult {
        let depth = self.queue_depth();
        let fill = depth as f64 / self.capacity.max(1) as f64;
        let result = if fill >= 1.0 {
            HealthCheckResult::unhealthy("ingress queue full".to_string())
        } else if fill >= DEGRADED_FILL_RATIO {
            HealthCheckResult::degraded(format!("ingress queue {:.0}% full", fill * 100.0))
        } else {
            HealthCheckResult::healthy()
        };
        result
            .with_detail("queue_depth", serde_json::json!(depth))
            .with_detail("queue_capacity", serde_json::json!(self.capacity))
    }
}
