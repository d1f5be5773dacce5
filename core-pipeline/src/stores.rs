// =====================================================================================
// File: core-pipeline/src/stores.rs
// Description: Narrow persistence and enrichment seams consumed by the pipeline
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::PipelineResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_events::{DlpEvent, EventType};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Filter for reading events back out of the store
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub event_type: Option<EventType>,
    pub agent_id: Option<String>,
    pub blocked_only: bool,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Narrow append/query interface over event persistence.
///
/// The real storage schema lives outside the core; the pipeline only ever
/// appends closed events and reads them back for the admin surface.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &DlpEvent) -> PipelineResult<()>;
    async fn query(&self, query: EventQuery) -> PipelineResult<Vec<DlpEvent>>;
}

/// In-memory event store for tests and single-node runs
pub struct MemoryEventStore {
    events: RwLock<Vec<DlpEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: &DlpEvent) -> PipelineResult<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn query(&self, query: EventQuery) -> PipelineResult<Vec<DlpEvent>> {
        let events = self.events.read().await;
        let matched: Vec<DlpEvent> = events
            .iter()
            .filter(|event| {
                query
                    .event_type
                    .as_ref()
                    .map_or(true, |kind| &event.event.kind == kind)
                    && query
                        .agent_id
                        .as_ref()
                        .map_or(true, |id| &event.agent.id == id)
                    && (!query.blocked_only || event.blocked)
                    && query.since.map_or(true, |since| event.timestamp >= since)
            })
            .take(query.limit.unwrap_or(100))
            .cloned()
            .collect();
        Ok(matched)
    }
}

/// Country lookup used during enrichment when a provider is available
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup_country(&self, ip: &str) -> Option<String>;
}

/// Table-backed geo provider for tests and air-gapped deployments
pub struct StaticGeoProvider {
    table: HashMap<String, String>,
}

impl StaticGeoProvider {
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl GeoProvider for StaticGeoProvider {
    async fn lookup_country(&self, ip: &str) -> Option<String> {
        self.table.get(ip).cloned()
    }
}
