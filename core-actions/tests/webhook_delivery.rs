// =====================================================================================
// File: core-actions/tests/webhook_delivery.rs
// Description: Webhook action delivery tests against a mock endpoint
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use chrono::Utc;
use core_actions::ActionExecutor;
use core_events::{Action, DlpEvent, EventType, PolicyMatch, Severity};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn plan_with_webhook(url: &str, headers: &str) -> PolicyMatch {
    let action: Action = serde_json::from_str(&format!(
        r#"{{"type": "webhook", "url": "{}", "headers": {}}}"#,
        url, headers
    ))
    .unwrap();
    PolicyMatch {
        policy_id: "exfil-policy".to_string(),
        policy_name: "Exfiltration Policy".to_string(),
        rule_id: "rule-001".to_string(),
        rule_name: "Webhook Rule".to_string(),
        severity: Severity::High,
        matched_at: Utc::now(),
        actions: vec![action],
    }
}

#[tokio::test]
async fn webhook_posts_pruned_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/dlp"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "event_type": "dlp_incident",
            "event_id": "evt-hook-1",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let executor = ActionExecutor::with_defaults().unwrap();
    let mut event = DlpEvent::new("evt-hook-1", "agent-001", EventType::Network)
        .with_content("outbound transfer");

    let plan = plan_with_webhook(
        &format!("{}/hooks/dlp", server.uri()),
        r#"{"x-api-key": "test-key"}"#,
    );
    let summary = executor.execute_plan(&mut event, &[plan]).await;

    assert_eq!(summary.successful_actions, 1);
    assert_eq!(summary.webhooks_called, 1);
    let result = &summary.actions_executed[0];
    assert_eq!(result.metadata["status_code"], 200);
}

#[tokio::test]
async fn webhook_failure_is_recorded_not_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/dlp"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let executor = ActionExecutor::with_defaults().unwrap();
    let mut event = DlpEvent::new("evt-hook-2", "agent-001", EventType::Network);

    let plan = plan_with_webhook(&format!("{}/hooks/dlp", server.uri()), "{}");
    let summary = executor.execute_plan(&mut event, &[plan]).await;

    assert_eq!(summary.failed_actions, 1);
    assert_eq!(summary.webhooks_called, 0);
    let result = &summary.actions_executed[0];
    assert!(result.error.as_deref().unwrap().contains("503"));
}
