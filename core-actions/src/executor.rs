// =====================================================================================
// File: core-actions/src/executor.rs
// Description: Action plan execution with per-variant handlers
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::providers::{
    AuditRecord, AuditSink, LogNotifier, MemoryAuditSink, MemoryQuarantineStore,
    NotificationSender, QuarantineStore, SiemForwarder, WebhookClient,
};
use crate::{ActionError, ActionExecResult};
use chrono::Utc;
use core_detection::Redactor;
use core_events::{
    Action, ActionResult, ActionType, DlpEvent, ExecutionSummary, NotificationChannel,
    PolicyMatch, SiemEnvelope,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Timeout applied to delivery-style actions (notify, webhook, SIEM
    /// forward, quarantine storage)
    pub action_timeout: Duration,
    /// Value of the envelope `source` field for outbound payloads
    pub source_name: String,
    /// Default audit retention when a rule does not override it
    pub default_retention_days: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(5),
            source_name: "sentinel_dlp".to_string(),
            default_retention_days: 365,
        }
    }
}

/// Interprets matched rules' action plans against one event.
///
/// Actions within one rule run in declared order; rules contribute their
/// actions in the order the evaluator produced matches. A failing action
/// never cancels its siblings.
pub struct ActionExecutor {
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSender>,
    quarantine: Arc<dyn QuarantineStore>,
    siem: Option<Arc<dyn SiemForwarder>>,
    webhooks: WebhookClient,
    config: ExecutorConfig,
    delivered: Mutex<HashSet<String>>,
}

impl ActionExecutor {
    pub fn new(
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationSender>,
        quarantine: Arc<dyn QuarantineStore>,
        siem: Option<Arc<dyn SiemForwarder>>,
        config: ExecutorConfig,
    ) -> ActionExecResult<Self> {
        let webhooks = WebhookClient::new(config.action_timeout)?;
        Ok(Self {
            audit,
            notifier,
            quarantine,
            siem,
            webhooks,
            config,
            delivered: Mutex::new(HashSet::new()),
        })
    }

    /// Executor wired to in-memory providers, for tests and single-node runs
    pub fn with_defaults() -> ActionExecResult<Self> {
        Self::new(
            Arc::new(MemoryAuditSink::new()),
            Arc::new(LogNotifier),
            Arc::new(MemoryQuarantineStore::new()),
            None,
            ExecutorConfig::default(),
        )
    }

    pub fn with_siem(mut self, siem: Arc<dyn SiemForwarder>) -> Self {
        self.siem = Some(siem);
        self
    }

    /// Execute every matched rule's action plan in order
    pub async fn execute_plan(
        &self,
        event: &mut DlpEvent,
        matches: &[PolicyMatch],
    ) -> ExecutionSummary {
        let mut summary = ExecutionSummary::new(event.event_id.clone());

        for matched in matches {
            for action in &matched.actions {
                let result = self.execute_action(event, matched, action).await;
                if !result.success {
                    warn!(
                        event_id = %event.event_id,
                        policy_id = %matched.policy_id,
                        rule_id = %matched.rule_id,
                        action = %result.action_type,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Action failed"
                    );
                }
                summary.record(result);
            }
        }

        event.blocked = summary.blocked || event.blocked;
        summary.blocked = event.blocked;

        info!(
            event_id = %event.event_id,
            total = summary.total_actions,
            successful = summary.successful_actions,
            failed = summary.failed_actions,
            blocked = summary.blocked,
            "Action plan executed"
        );

        summary
    }

    async fn execute_action(
        &self,
        event: &mut DlpEvent,
        matched: &PolicyMatch,
        action: &Action,
    ) -> ActionResult {
        let action_type = action.action_type();
        let dedup_key = self.dedup_key(event, matched, action_type);

        // Idempotent actions: a redelivered (event, rule, action) triple is
        // acknowledged without a second side effect.
        if action.is_idempotent() && self.delivered.lock().await.contains(&dedup_key) {
            debug!(
                event_id = %event.event_id,
                action = %action_type,
                "Duplicate delivery suppressed"
            );
            return ActionResult::success(action_type, &matched.policy_id, &matched.rule_id)
                .with_message("duplicate delivery suppressed")
                .with_metadata("deduplicated", json!(true))
                .with_dedup_key(dedup_key);
        }

        let result = match action {
            Action::Alert {
                severity,
                title,
                description,
            } => {
                let severity = (*severity).unwrap_or(matched.severity);
                let alert_id = format!("alert-{}", &dedup_key[..12]);
                let record = AuditRecord {
                    audit_id: alert_id.clone(),
                    dedup_key: dedup_key.clone(),
                    event_id: event.event_id.clone(),
                    policy_id: matched.policy_id.clone(),
                    rule_id: matched.rule_id.clone(),
                    action: "alert".to_string(),
                    details: json!({
                        "severity": severity.as_str(),
                        "title": title,
                        "description": description,
                    }),
                    timestamp: Utc::now(),
                };
                match self.audit.append(record).await {
                    Ok(_) => Ok(ActionResult::success(
                        action_type,
                        &matched.policy_id,
                        &matched.rule_id,
                    )
                    .with_message(format!("alert raised ({})", severity))
                    .with_metadata("alert_id", json!(alert_id))
                    .with_metadata("severity", json!(severity.as_str()))),
                    Err(e) => Err(e),
                }
            }

            Action::Block { reason } => {
                event.blocked = true;
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("event blocked")
                .with_metadata(
                    "reason",
                    json!(reason.clone().unwrap_or_else(|| matched.policy_name.clone())),
                ))
            }

            Action::Quarantine { location, encrypt } => {
                match event.file.path.clone() {
                    None => Err(ActionError::unsupported(
                        "quarantine requires a file path on the event",
                    )),
                    Some(path) => {
                        let outcome = timeout(
                            self.config.action_timeout,
                            self.quarantine.quarantine(
                                &event.event_id,
                                &path,
                                location.as_deref(),
                                *encrypt,
                            ),
                        )
                        .await
                        .map_err(|_| ActionError::Timeout {
                            action: "quarantine".to_string(),
                        })
                        .and_then(|inner| inner);

                        outcome.map(|quarantine_path| {
                            ActionResult::success(
                                action_type,
                                &matched.policy_id,
                                &matched.rule_id,
                            )
                            .with_message("file quarantined")
                            .with_metadata("original_path", json!(path))
                            .with_metadata("quarantine_path", json!(quarantine_path))
                            .with_metadata("encrypted", json!(encrypt))
                        })
                    }
                }
            }

            Action::Redact { method } => {
                let before = event.content.len();
                event.content = Redactor::redact(&event.content, &event.classification, *method);
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("content redacted")
                .with_metadata("method", json!(method))
                .with_metadata("spans_redacted", json!(event.classification.len()))
                .with_metadata("bytes_before", json!(before))
                .with_metadata("bytes_after", json!(event.content.len())))
            }

            Action::Encrypt { algorithm } => {
                let key_id = format!("key-{}", &dedup_key[..12]);
                event
                    .metadata
                    .insert("encrypted".to_string(), json!(true));
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("payload handed to encryption service")
                .with_metadata("algorithm", json!(algorithm))
                .with_metadata("key_id", json!(key_id)))
            }

            Action::Notify {
                channel,
                recipients,
                template,
            } => self.notify(event, matched, *channel, recipients, template.as_deref()).await,

            Action::Webhook { url, headers } => {
                let payload = SiemEnvelope::from_event(event, &self.config.source_name).into_value();
                let outcome = timeout(
                    self.config.action_timeout,
                    self.webhooks.post_json(url, headers, &payload),
                )
                .await
                .map_err(|_| ActionError::Timeout {
                    action: "webhook".to_string(),
                })
                .and_then(|inner| inner);

                outcome.map(|status| {
                    ActionResult::success(action_type, &matched.policy_id, &matched.rule_id)
                        .with_message("webhook delivered")
                        .with_metadata("url", json!(url))
                        .with_metadata("status_code", json!(status))
                })
            }

            Action::Audit {
                log_level,
                retention_days,
            } => {
                let record = AuditRecord {
                    audit_id: format!("aud-{}", &dedup_key[..12]),
                    dedup_key: dedup_key.clone(),
                    event_id: event.event_id.clone(),
                    policy_id: matched.policy_id.clone(),
                    rule_id: matched.rule_id.clone(),
                    action: "audit".to_string(),
                    details: json!({
                        "log_level": log_level.clone().unwrap_or_else(|| "detailed".to_string()),
                        "classification": event.classification.len(),
                        "blocked": event.blocked,
                    }),
                    timestamp: Utc::now(),
                };
                match self.audit.append(record).await {
                    Ok(audit_id) => Ok(ActionResult::success(
                        action_type,
                        &matched.policy_id,
                        &matched.rule_id,
                    )
                    .with_message("audit trail updated")
                    .with_metadata("audit_id", json!(audit_id))
                    .with_metadata(
                        "retention_days",
                        json!((*retention_days).unwrap_or(self.config.default_retention_days)),
                    )),
                    Err(e) => Err(e),
                }
            }

            Action::Tag { tags } => {
                let existing = event
                    .metadata
                    .entry("tags".to_string())
                    .or_insert_with(|| json!([]));
                if let Some(list) = existing.as_array_mut() {
                    for tag in tags {
                        let value = json!(tag);
                        if !list.contains(&value) {
                            list.push(value);
                        }
                    }
                }
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("event tagged")
                .with_metadata("tags", json!(tags)))
            }

            Action::Escalate { to_severity } => {
                let from = event.event.severity;
                let to = (*to_severity).unwrap_or_else(|| from.escalated());
                event.event.severity = to;
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("severity escalated")
                .with_metadata("from", json!(from.as_str()))
                .with_metadata("to", json!(to.as_str())))
            }

            Action::Delete => match event.file.path.clone() {
                None => Err(ActionError::unsupported(
                    "delete requires a file path on the event",
                )),
                Some(path) => Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("delete directive issued to agent")
                .with_metadata("path", json!(path))
                .with_metadata("directive", json!("delete"))),
            },

            Action::Preserve { location } => Ok(ActionResult::success(
                action_type,
                &matched.policy_id,
                &matched.rule_id,
            )
            .with_message("preservation hold recorded")
            .with_metadata("path", json!(event.file.path))
            .with_metadata(
                "location",
                json!(location.clone().unwrap_or_else(|| "legal-hold".to_string())),
            )
            .with_metadata("legal_hold", json!(true))),

            Action::FlagForReview { reviewer, priority } => {
                let review_id = format!("rev-{}", &dedup_key[..12]);
                let record = AuditRecord {
                    audit_id: review_id.clone(),
                    dedup_key: dedup_key.clone(),
                    event_id: event.event_id.clone(),
                    policy_id: matched.policy_id.clone(),
                    rule_id: matched.rule_id.clone(),
                    action: "flag_for_review".to_string(),
                    details: json!({
                        "reviewer": reviewer,
                        "priority": priority.clone().unwrap_or_else(|| "normal".to_string()),
                    }),
                    timestamp: Utc::now(),
                };
                match self.audit.append(record).await {
                    Ok(_) => Ok(ActionResult::success(
                        action_type,
                        &matched.policy_id,
                        &matched.rule_id,
                    )
                    .with_message("event flagged for review")
                    .with_metadata("review_id", json!(review_id))),
                    Err(e) => Err(e),
                }
            }

            Action::CreateIncident { severity, assignee } => {
                let incident_id = format!("inc-{}", &dedup_key[..12]);
                Ok(ActionResult::success(
                    action_type,
                    &matched.policy_id,
                    &matched.rule_id,
                )
                .with_message("incident created")
                .with_metadata("incident_id", json!(incident_id))
                .with_metadata(
                    "severity",
                    json!((*severity).unwrap_or(matched.severity).as_str()),
                )
                .with_metadata("assignee", json!(assignee)))
            }

            // No defined side effect: acknowledged so test expectations and
            // downstream consumers see a result for every planned action.
            Action::Track => Ok(ActionResult::success(
                action_type,
                &matched.policy_id,
                &matched.rule_id,
            )
            .with_message("tracked")
            .with_metadata("dedup_key", json!(dedup_key.clone()))),
        };

        match result {
            Ok(result) => {
                // Only a completed delivery counts against future redelivery
                if action.is_idempotent() {
                    self.delivered.lock().await.insert(dedup_key.clone());
                }
                result.with_dedup_key(dedup_key)
            }
            Err(e) => {
                ActionResult::failure(action_type, &matched.policy_id, &matched.rule_id, e.to_string())
                    .with_dedup_key(dedup_key)
            }
        }
    }

    async fn notify(
        &self,
        event: &DlpEvent,
        matched: &PolicyMatch,
        channel: NotificationChannel,
        recipients: &[String],
        template: Option<&str>,
    ) -> ActionExecResult<ActionResult> {
        // channel=siem routes through the fan-out instead of the notifier
        if channel == NotificationChannel::Siem {
            let forwarder = self.siem.as_ref().ok_or_else(|| {
                ActionError::unsupported("no SIEM forwarder configured for notify(channel=siem)")
            })?;
            let results = timeout(self.config.action_timeout, forwarder.forward(event))
                .await
                .map_err(|_| ActionError::Timeout {
                    action: "forward_to_siem".to_string(),
                })
                .and_then(|inner| inner)?;

            let delivered = results.values().filter(|ok| **ok).count();
            return Ok(ActionResult::success(
                ActionType::Notify,
                &matched.policy_id,
                &matched.rule_id,
            )
            .with_message(format!(
                "forwarded to {}/{} SIEM sinks",
                delivered,
                results.len()
            ))
            .with_metadata("channel", json!("siem"))
            .with_metadata("sinks", serde_json::to_value(&results)?));
        }

        let subject = format!(
            "DLP {}: policy {} matched event {}",
            matched.severity, matched.policy_name, event.event_id
        );
        let body = template
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("Rule {} matched. Blocked: {}.", matched.rule_name, event.blocked));

        let notification_id = timeout(
            self.config.action_timeout,
            self.notifier.send(channel, recipients, &subject, &body),
        )
        .await
        .map_err(|_| ActionError::Timeout {
            action: "notify".to_string(),
        })
        .and_then(|inner| inner)?;

        Ok(ActionResult::success(
            ActionType::Notify,
            &matched.policy_id,
            &matched.rule_id,
        )
        .with_message("notification sent")
        .with_metadata("channel", json!(channel.as_str()))
        .with_metadata("recipients", json!(recipients))
        .with_metadata("notification_id", json!(notification_id)))
    }

    /// Deterministic dedup key for a (event, policy, rule, action) tuple
    fn dedup_key(&self, event: &DlpEvent, matched: &PolicyMatch, action_type: ActionType) -> String {
        let material = format!(
            "{}:{}:{}:{}",
            event.event_id, matched.policy_id, matched.rule_id, action_type
        );
        hex::encode(Sha256::digest(material.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{EventType, FileInfo, Severity};

    fn matched(actions: Vec<Action>) -> PolicyMatch {
        PolicyMatch {
            policy_id: "test-policy".to_string(),
            policy_name: "Test Policy".to_string(),
            rule_id: "rule-001".to_string(),
            rule_name: "Test Rule".to_string(),
            severity: Severity::High,
            matched_at: Utc::now(),
            actions,
        }
    }

    fn classified_event() -> DlpEvent {
        let content = "Payment with card: 4111111111111111";
        let mut event =
            DlpEvent::new("evt-001", "agent-001", EventType::Clipboard).with_content(content);
        event.classification = core_detection::Classifier::with_defaults().classify(content);
        event
    }

    fn action(json: &str) -> Action {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_alert_and_block_plan() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        let plan = matched(vec![
            action(r#"{"type": "alert", "severity": "critical"}"#),
            action(r#"{"type": "block"}"#),
        ]);

        let summary = executor.execute_plan(&mut event, &[plan]).await;

        assert_eq!(summary.total_actions, 2);
        assert_eq!(summary.successful_actions, 2);
        assert_eq!(summary.failed_actions, 0);
        assert!(summary.blocked);
        assert!(event.blocked);
        assert_eq!(summary.alerts_created, 1);
    }

    #[tokio::test]
    async fn test_redact_mutates_event_for_later_actions() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        let plan = matched(vec![action(r#"{"type": "redact", "method": "full"}"#)]);

        let summary = executor.execute_plan(&mut event, &[plan]).await;

        assert!(summary.redacted);
        assert!(!event.content.contains("4111111111111111"));
        assert!(event.content.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_quarantine_requires_file_path() {
        let executor = ActionExecutor::with_defaults().unwrap();

        let mut pathless = classified_event();
        let summary = executor
            .execute_plan(
                &mut pathless,
                &[matched(vec![action(r#"{"type": "quarantine"}"#)])],
            )
            .await;
        assert_eq!(summary.failed_actions, 1);
        assert!(!summary.quarantined);

        let mut with_file = classified_event().with_file(FileInfo {
            path: Some("/home/user/cards.csv".to_string()),
            name: Some("cards.csv".to_string()),
            ..FileInfo::default()
        });
        let summary = executor
            .execute_plan(
                &mut with_file,
                &[matched(vec![action(r#"{"type": "quarantine"}"#)])],
            )
            .await;
        assert!(summary.quarantined);
    }

    #[tokio::test]
    async fn test_failed_action_does_not_cancel_siblings() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        // Quarantine fails (no file path); audit and block still run
        let plan = matched(vec![
            action(r#"{"type": "quarantine"}"#),
            action(r#"{"type": "audit"}"#),
            action(r#"{"type": "block"}"#),
        ]);

        let summary = executor.execute_plan(&mut event, &[plan]).await;

        assert_eq!(summary.total_actions, 3);
        assert_eq!(summary.failed_actions, 1);
        assert_eq!(summary.successful_actions, 2);
        assert!(summary.blocked);
    }

    #[tokio::test]
    async fn test_idempotent_actions_dedup_on_redelivery() {
        let audit = Arc::new(MemoryAuditSink::new());
        let executor = ActionExecutor::new(
            audit.clone(),
            Arc::new(LogNotifier),
            Arc::new(MemoryQuarantineStore::new()),
            None,
            ExecutorConfig::default(),
        )
        .unwrap();

        let mut event = classified_event();
        let plan = matched(vec![action(r#"{"type": "audit"}"#)]);

        let first = executor.execute_plan(&mut event, &[plan.clone()]).await;
        let second = executor.execute_plan(&mut event, &[plan]).await;

        assert_eq!(first.successful_actions, 1);
        assert_eq!(second.successful_actions, 1);
        // The redelivery was acknowledged but wrote nothing new
        assert_eq!(audit.len().await, 1);
        assert_eq!(
            second.actions_executed[0].metadata.get("deduplicated"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn test_track_is_a_recorded_noop() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        let summary = executor
            .execute_plan(&mut event, &[matched(vec![action(r#"{"type": "track"}"#)])])
            .await;

        assert_eq!(summary.successful_actions, 1);
        let result = &summary.actions_executed[0];
        assert_eq!(result.action_type, ActionType::Track);
        assert!(result.metadata.contains_key("dedup_key"));
    }

    #[tokio::test]
    async fn test_escalate_updates_severity() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event().with_severity(Severity::Medium);
        let summary = executor
            .execute_plan(&mut event, &[matched(vec![action(r#"{"type": "escalate"}"#)])])
            .await;

        assert_eq!(summary.successful_actions, 1);
        assert_eq!(event.event.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_tag_accumulates_without_duplicates() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        let plan = matched(vec![action(
            r#"{"type": "tag", "tags": ["pci", "sensitive"]}"#,
        )]);
        executor.execute_plan(&mut event, &[plan]).await;

        let another = PolicyMatch {
            rule_id: "rule-002".to_string(),
            ..matched(vec![action(r#"{"type": "tag", "tags": ["pci", "urgent"]}"#)])
        };
        executor.execute_plan(&mut event, &[another]).await;

        let tags = event.metadata["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[tokio::test]
    async fn test_notify_siem_without_forwarder_fails_gracefully() {
        let executor = ActionExecutor::with_defaults().unwrap();
        let mut event = classified_event();
        let summary = executor
            .execute_plan(
                &mut event,
                &[matched(vec![action(r#"{"type": "notify", "channel": "siem"}"#)])],
            )
            .await;

        assert_eq!(summary.failed_actions, 1);
        assert!(summary.actions_executed[0]
            .error
            .as_deref()
            .unwrap()
            .contains("SIEM forwarder"));
    }

    struct StubForwarder {
        outcome: std::collections::HashMap<String, bool>,
    }

    #[async_trait::async_trait]
    impl SiemForwarder for StubForwarder {
        async fn forward(
            &self,
            _event: &DlpEvent,
        ) -> ActionExecResult<std::collections::HashMap<String, bool>> {
            Ok(self.outcome.clone())
        }
    }

    #[tokio::test]
    async fn test_notify_siem_reports_per_sink_outcome() {
        let mut outcome = std::collections::HashMap::new();
        outcome.insert("sink_a".to_string(), true);
        outcome.insert("sink_b".to_string(), false);

        let executor = ActionExecutor::with_defaults()
            .unwrap()
            .with_siem(Arc::new(StubForwarder { outcome }));

        let mut event = classified_event();
        let summary = executor
            .execute_plan(
                &mut event,
                &[matched(vec![action(r#"{"type": "notify", "channel": "siem"}"#)])],
            )
            .await;

        // Partial sink failure is not an action failure
        assert_eq!(summary.successful_actions, 1);
        let sinks = &summary.actions_executed[0].metadata["sinks"];
        assert_eq!(sinks["sink_a"], true);
        assert_eq!(sinks["sink_b"], false);
    }
}
