// =====================================================================================
// File: core-policy/tests/policy_engine.rs
// Description: Policy catalog loading and hot reload integration tests
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use core_events::{ClassificationHit, DlpEvent, EventType, Span};
use core_policy::{CatalogService, RuleEvaluator};
use std::sync::Arc;
use tempfile::TempDir;

fn write_policy(dir: &TempDir, file_name: &str, id: &str, priority: i32, value: &str) {
    let yaml = format!(
        r#"
policy:
  id: {id}
  name: Policy {id}
  enabled: true
  priority: {priority}
  severity: high
rules:
  - id: rule-001
    name: Detection rule
    conditions:
      - field: classification.type
        operator: equals
        value: {value}
    actions:
      - type: alert
        severity: high
      - type: block
"#
    );
    std::fs::write(dir.path().join(file_name), yaml).unwrap();
}

fn credit_card_event() -> DlpEvent {
    let mut event = DlpEvent::new("evt-001", "agent-001", EventType::Clipboard)
        .with_content("Payment with card: 4111111111111111");
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

#[tokio::test]
async fn load_policies_from_empty_directory() {
    let dir = TempDir::new().unwrap();
    let service = CatalogService::new(dir.path());
    let report = service.load_policies().await.unwrap();

    assert_eq!(report.loaded, 0);
    assert!(service.snapshot().await.is_empty());
}

#[tokio::test]
async fn load_single_policy() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "test_policy.yml", "test-policy-001", 10, "credit_card");

    let service = CatalogService::new(dir.path());
    let report = service.load_policies().await.unwrap();

    assert_eq!(report.loaded, 1);
    let snapshot = service.snapshot().await;
    assert!(snapshot.get("test-policy-001").is_some());
}

#[tokio::test]
async fn load_multiple_policies_sorted_by_priority() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "policy_2.yml", "test-policy-002", 30, "ssn");
    write_policy(&dir, "policy_0.yml", "test-policy-000", 10, "credit_card");
    write_policy(&dir, "policy_1.yml", "test-policy-001", 20, "email");

    let service = CatalogService::new(dir.path());
    service.load_policies().await.unwrap();

    let snapshot = service.snapshot().await;
    let priorities: Vec<i32> = snapshot.policies().iter().map(|p| p.priority).collect();
    assert_eq!(priorities, vec![10, 20, 30]);
}

#[tokio::test]
async fn both_yaml_extensions_are_recognized() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "policy1.yml", "policy-yml", 10, "credit_card");
    write_policy(&dir, "policy2.yaml", "policy-yaml", 20, "email");
    std::fs::write(dir.path().join("notes.txt"), "not a policy").unwrap();

    let service = CatalogService::new(dir.path());
    let report = service.load_policies().await.unwrap();

    assert_eq!(report.loaded, 2);
}

#[tokio::test]
async fn invalid_yaml_is_skipped_with_report() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("invalid.yml"),
        "invalid: yaml: syntax:\n  - bad indentation",
    )
    .unwrap();
    write_policy(&dir, "valid.yml", "valid-policy", 10, "credit_card");

    let service = CatalogService::new(dir.path());
    let report = service.load_policies().await.unwrap();

    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.contains("invalid.yml"));
}

#[tokio::test]
async fn structurally_invalid_policy_is_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("incomplete.yml"),
        "policy:\n  name: No id here\nrules: []\n",
    )
    .unwrap();

    let service = CatalogService::new(dir.path());
    let report = service.load_policies().await.unwrap();

    assert_eq!(report.loaded, 0);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("policy.id"));
}

#[tokio::test]
async fn reload_replaces_catalog_contents() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "p1.yml", "policy-one", 10, "credit_card");

    let service = CatalogService::new(dir.path());
    service.load_policies().await.unwrap();
    assert!(service.snapshot().await.get("policy-one").is_some());

    std::fs::remove_file(dir.path().join("p1.yml")).unwrap();
    write_policy(&dir, "p2.yml", "policy-two", 10, "email");
    service.reload().await.unwrap();

    let snapshot = service.snapshot().await;
    assert!(snapshot.get("policy-one").is_none());
    assert!(snapshot.get("policy-two").is_some());
}

/// An evaluation started on the pre-reload snapshot keeps seeing the old
/// policy set; the next evaluation sees the new one. Never a mix.
#[tokio::test]
async fn reload_is_atomic_for_in_flight_evaluations() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "p1.yml", "policy-before", 10, "credit_card");

    let service = Arc::new(CatalogService::new(dir.path()));
    service.load_policies().await.unwrap();

    // Simulates a worker mid-evaluation: it holds the old snapshot
    let held_snapshot = service.snapshot().await;

    std::fs::remove_file(dir.path().join("p1.yml")).unwrap();
    write_policy(&dir, "p2.yml", "policy-after", 10, "credit_card");
    service.reload().await.unwrap();

    let event = credit_card_event();

    let old_outcome = RuleEvaluator::evaluate(&event, &held_snapshot);
    assert_eq!(old_outcome.matches.len(), 1);
    assert_eq!(old_outcome.matches[0].policy_id, "policy-before");

    let new_outcome = RuleEvaluator::evaluate(&event, &*service.snapshot().await);
    assert_eq!(new_outcome.matches.len(), 1);
    assert_eq!(new_outcome.matches[0].policy_id, "policy-after");
}

#[tokio::test]
async fn watcher_picks_up_directory_changes() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "p1.yml", "watched-policy", 10, "credit_card");

    let service = Arc::new(CatalogService::new(dir.path()));
    service.load_policies().await.unwrap();
    let watcher = service.spawn_watcher(std::time::Duration::from_millis(50));

    write_policy(&dir, "p2.yml", "late-arrival", 20, "email");

    // Give the poller a few ticks to observe the new file
    let mut found = false;
    for _ in 0..40 {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        if service.snapshot().await.get("late-arrival").is_some() {
            found = true;
            break;
        }
    }
    watcher.abort();
    assert!(found, "watcher never reloaded the catalog");
}

#[tokio::test]
async fn classification_and_evaluation_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_policy(&dir, "cc.yml", "cc-policy", 10, "credit_card");

    let service = CatalogService::new(dir.path());
    service.load_policies().await.unwrap();

    // Classify real content, then evaluate the resulting event
    let classifier = core_detection::Classifier::with_defaults();
    let content = "Payment with card: 4111111111111111";
    let mut event =
        DlpEvent::new("evt-e2e", "agent-001", EventType::Clipboard).with_content(content);
    event.classification = classifier.classify(content);

    let outcome = RuleEvaluator::evaluate(&event, &*service.snapshot().await);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].policy_id, "cc-policy");
}
