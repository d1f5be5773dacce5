// =====================================================================================
// File: core-siem/src/registry.rs
// Description: Connector registry and concurrent multi-SIEM fan-out
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::connector::{
    BatchResult, ConnectorState, ConnectorSummary, SiemConnector, SiemHealth, SiemHealthStatus,
};
use crate::SiemResult;
use core_events::DlpEvent;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Registry owning the connector set.
///
/// All per-connector fan-out calls run concurrently and wait for every
/// connector to settle; per-connector errors are captured in the result map
/// and never propagate. Constructed once at startup and injected into the
/// pipeline.
pub struct SiemRegistry {
    connectors: RwLock<HashMap<String, Arc<dyn SiemConnector>>>,
    states: RwLock<HashMap<String, ConnectorState>>,
}

impl SiemRegistry {
    pub fn new() -> Self {
        Self {
            connectors: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connector. Idempotent on name: the last registration wins.
    pub async fn register(&self, connector: Arc<dyn SiemConnector>) {
        let name = connector.name().to_string();
        info!(connector = %name, siem_type = %connector.siem_type(), "SIEM connector registered");
        self.connectors.write().await.insert(name.clone(), connector);
        self.states
            .write()
            .await
            .insert(name, ConnectorState::Registered);
    }

    /// Disconnect and drop a connector. Returns whether it existed.
    pub async fn unregister(&self, name: &str) -> bool {
        let connector = self.connectors.write().await.remove(name);
        match connector {
            Some(connector) => {
                if let Err(e) = connector.disconnect().await {
                    warn!(connector = %name, error = %e, "Disconnect during unregister failed");
                }
                self.states.write().await.remove(name);
                info!(connector = %name, "SIEM connector unregistered");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn SiemConnector>> {
        self.connectors.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.connectors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connectors.read().await.is_empty()
    }

    /// Names of connectors currently in the active (connected) set
    pub async fn active_names(&self) -> Vec<String> {
        self.states
            .read()
            .await
            .iter()
            .filter(|(_, state)| **state == ConnectorState::Connected)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Listing for the admin surface
    pub async fn list_connectors(&self) -> Vec<ConnectorSummary> {
        let connectors = self.connectors.read().await;
        let states = self.states.read().await;
        let mut summaries: Vec<ConnectorSummary> = connectors
            .iter()
            .map(|(name, connector)| {
                let state = states
                    .get(name)
                    .copied()
                    .unwrap_or(ConnectorState::Registered);
                ConnectorSummary {
                    name: name.clone(),
                    siem_type: connector.siem_type(),
                    connected: connector.connected(),
                    state,
                    active: state == ConnectorState::Connected,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Connect every registered connector concurrently. Connectors that
    /// report success form the active set.
    pub async fn connect_all(&self) -> HashMap<String, bool> {
        let targets = self.snapshot().await;
        let results = join_all(targets.into_iter().map(|(name, connector)| async move {
            let outcome = connector.connect().await;
            (name, outcome)
        }))
        .await;

        let mut status = HashMap::new();
        let mut states = self.states.write().await;
        for (name, outcome) in results {
            match outcome {
                Ok(()) => {
                    states.insert(name.clone(), ConnectorState::Connected);
                    status.insert(name, true);
                }
                Err(e) => {
                    warn!(connector = %name, error = %e, "SIEM connect failed");
                    states.insert(name.clone(), ConnectorState::Registered);
                    status.insert(name, false);
                }
            }
        }

        info!(
            total = status.len(),
            successful = status.values().filter(|ok| **ok).count(),
            "SIEM connect_all completed"
        );
        status
    }

    /// Disconnect every connector concurrently
    pub async fn disconnect_all(&self) -> HashMap<String, bool> {
        let targets = self.snapshot().await;
        let results = join_all(targets.into_iter().map(|(name, connector)| async move {
            let outcome = connector.disconnect().await;
            (name, outcome.is_ok())
        }))
        .await;

        let mut states = self.states.write().await;
        let mut status = HashMap::new();
        for (name, ok) in results {
            states.insert(name.clone(), ConnectorState::Disconnected);
            status.insert(name, ok);
        }
        status
    }

    /// Send one event to every active connector concurrently.
    ///
    /// Every active connector is called exactly once; the result map carries
    /// one success boolean per connector, with failures captured in place.
    pub async fn send_event_to_all(
        &self,
        event: &DlpEvent,
        index: Option<&str>,
    ) -> HashMap<String, bool> {
        let targets = self.active_snapshot().await;
        let results = join_all(targets.into_iter().map(|(name, connector)| {
            let event = event.clone();
            let index = index.map(str::to_string);
            async move {
                let outcome = connector.send_event(&event, index.as_deref()).await;
                (name, outcome)
            }
        }))
        .await;

        let mut status = HashMap::new();
        for (name, outcome) in results {
            match outcome {
                Ok(()) => {
                    status.insert(name, true);
                }
                Err(e) => {
                    warn!(connector = %name, event_id = %event.event_id, error = %e, "SIEM event forward failed");
                    status.insert(name, false);
                }
            }
        }
        status
    }

    /// Send a batch to every active connector concurrently
    pub async fn send_batch_to_all(
        &self,
        events: &[DlpEvent],
        index: Option<&str>,
    ) -> HashMap<String, BatchResult> {
        let targets = self.active_snapshot().await;
        let results = join_all(targets.into_iter().map(|(name, connector)| {
            let events = events.to_vec();
            let index = index.map(str::to_string);
            async move {
                let outcome = connector.send_batch(&events, index.as_deref()).await;
                (name, outcome)
            }
        }))
        .await;

        let mut status = HashMap::new();
        for (name, outcome) in results {
            match outcome {
                Ok(result) => {
                    status.insert(name, result);
                }
                Err(e) => {
                    warn!(connector = %name, error = %e, "SIEM batch forward failed");
                    status.insert(name, BatchResult::rejected(events.len(), e.to_string()));
                }
            }
        }
        status
    }

    /// Probe every connector concurrently. A connectivity failure moves the
    /// connector to `unhealthy`; other outcomes leave membership untouched.
    pub async fn health_check_all(&self) -> HashMap<String, SiemHealth> {
        let targets = self.snapshot().await;
        let results = join_all(targets.into_iter().map(|(name, connector)| async move {
            let health = connector.health_check().await;
            (name, health)
        }))
        .await;

        let mut states = self.states.write().await;
        let mut health_map = HashMap::new();
        for (name, health) in results {
            if health.status == SiemHealthStatus::Error && !health.connected {
                states.insert(name.clone(), ConnectorState::Unhealthy);
            }
            health_map.insert(name, health);
        }
        health_map
    }

    async fn snapshot(&self) -> Vec<(String, Arc<dyn SiemConnector>)> {
        self.connectors
            .read()
            .await
            .iter()
            .map(|(name, connector)| (name.clone(), Arc::clone(connector)))
            .collect()
    }

    async fn active_snapshot(&self) -> Vec<(String, Arc<dyn SiemConnector>)> {
        let active = self.active_names().await;
        let connectors = self.connectors.read().await;
        active
            .into_iter()
            .filter_map(|name| {
                connectors
                    .get(&name)
                    .map(|connector| (name, Arc::clone(connector)))
            })
            .collect()
    }
}

impl Default for SiemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{AlertCreation, AlertRequest, ConnectionTest, SiemType};
    use crate::SiemError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use core_events::EventType;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scriptable in-memory connector for registry tests
    struct FakeConnector {
        name: String,
        fail_send: bool,
        fail_connect: bool,
        connected: AtomicBool,
        send_calls: AtomicUsize,
    }

    impl FakeConnector {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_send: false,
                fail_connect: false,
                connected: AtomicBool::new(false),
                send_calls: AtomicUsize::new(0),
            })
        }

        fn failing_send(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_send: true,
                fail_connect: false,
                connected: AtomicBool::new(false),
                send_calls: AtomicUsize::new(0),
            })
        }

        fn failing_connect(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_send: false,
                fail_connect: true,
                connected: AtomicBool::new(false),
                send_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SiemConnector for FakeConnector {
        fn name(&self) -> &str {
            &self.name
        }

        fn siem_type(&self) -> SiemType {
            SiemType::Custom
        }

        fn connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn connect(&self) -> SiemResult<()> {
            if self.fail_connect {
                return Err(SiemError::connection_error("refused"));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> SiemResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn test_connection(&self) -> SiemResult<ConnectionTest> {
            if self.fail_connect {
                return Err(SiemError::connection_error("refused"));
            }
            Ok(ConnectionTest::ok("ok"))
        }

        async fn send_event(&self, _event: &DlpEvent, _index: Option<&str>) -> SiemResult<()> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_send {
                Err(SiemError::transport_error("sink exploded"))
            } else {
                Ok(())
            }
        }

        async fn send_batch(
            &self,
            events: &[DlpEvent],
            _index: Option<&str>,
        ) -> SiemResult<BatchResult> {
            if self.fail_send {
                Err(SiemError::transport_error("sink exploded"))
            } else {
                Ok(BatchResult::complete(events.len(), events.len(), None))
            }
        }

        async fn query_events(
            &self,
            _query: &str,
            _start_time: DateTime<Utc>,
            _end_time: DateTime<Utc>,
            _limit: usize,
        ) -> SiemResult<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }

        async fn create_alert(&self, request: &AlertRequest) -> SiemResult<AlertCreation> {
            Ok(AlertCreation {
                success: true,
                alert_id: request.name.clone(),
                message: "ok".to_string(),
            })
        }
    }

    fn event() -> DlpEvent {
        DlpEvent::new("evt-001", "agent-001", EventType::Clipboard)
    }

    #[tokio::test]
    async fn test_register_is_last_wins() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("sink")).await;
        registry.register(FakeConnector::new("sink")).await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_connect_all_builds_active_set() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("good")).await;
        registry.register(FakeConnector::failing_connect("bad")).await;

        let results = registry.connect_all().await;
        assert_eq!(results["good"], true);
        assert_eq!(results["bad"], false);

        let active = registry.active_names().await;
        assert_eq!(active, vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn test_fanout_calls_every_active_connector_once() {
        let registry = SiemRegistry::new();
        let a = FakeConnector::new("sink_a");
        let b = FakeConnector::new("sink_b");
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;
        registry.connect_all().await;

        let results = registry.send_event_to_all(&event(), None).await;

        assert_eq!(results.len(), 2);
        assert!(results["sink_a"]);
        assert!(results["sink_b"]);
        assert_eq!(a.send_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failing_sink_does_not_affect_others() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("sink_a")).await;
        registry.register(FakeConnector::failing_send("sink_b")).await;
        registry.connect_all().await;

        let results = registry.send_event_to_all(&event(), None).await;

        assert_eq!(results["sink_a"], true);
        assert_eq!(results["sink_b"], false);
    }

    #[tokio::test]
    async fn test_inactive_connectors_are_skipped() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("never_connected")).await;

        let results = registry.send_event_to_all(&event(), None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_batch_fanout_partial_failure() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("sink_a")).await;
        registry.register(FakeConnector::failing_send("sink_b")).await;
        registry.connect_all().await;

        let events = vec![event(), event(), event()];
        let results = registry.send_batch_to_all(&events, None).await;

        assert!(results["sink_a"].success);
        assert_eq!(results["sink_a"].indexed, 3);
        assert!(!results["sink_b"].success);
        assert_eq!(results["sink_b"].failed, 3);
        assert_eq!(
            results["sink_b"].indexed + results["sink_b"].failed,
            results["sink_b"].total
        );
    }

    #[tokio::test]
    async fn test_health_check_marks_unreachable_connectors() {
        let registry = SiemRegistry::new();
        registry.register(FakeConnector::new("healthy")).await;
        registry.register(FakeConnector::failing_connect("down")).await;
        registry.connect_all().await;

        let health = registry.health_check_all().await;
        assert_eq!(health["healthy"].status, SiemHealthStatus::Healthy);
        assert_eq!(health["down"].status, SiemHealthStatus::Error);

        let listing = registry.list_connectors().await;
        let down = listing.iter().find(|c| c.name == "down").unwrap();
        assert_eq!(down.state, ConnectorState::Unhealthy);
    }

    #[tokio::test]
    async fn test_unregister_disconnects_first() {
        let registry = SiemRegistry::new();
        let connector = FakeConnector::new("sink");
        registry.register(connector.clone()).await;
        registry.connect_all().await;
        assert!(connector.connected());

        assert!(registry.unregister("sink").await);
        assert!(!connector.connected());
        assert!(registry.is_empty().await);
        assert!(!registry.unregister("sink").await);
    }
}
