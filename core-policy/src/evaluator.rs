// =====================================================================================
// File: core-policy/src/evaluator.rs
// Description: Rule evaluation against canonical events
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::catalog::PolicyCatalog;
use crate::model::{Condition, ConditionOperator, Policy, Rule};
use crate::{PolicyError, PolicyResult};
use chrono::{DateTime, Utc};
use core_events::{DlpEvent, PolicyMatch};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, error, warn};

/// Result of evaluating one event against a catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    /// Matches in the order they were produced (priority order)
    pub matches: Vec<PolicyMatch>,
    pub policies_evaluated: usize,
    pub rules_evaluated: usize,
}

/// Evaluates events against a catalog snapshot.
///
/// Evaluation is CPU-bound and never blocks on I/O. Field paths resolve
/// against the event's JSON tree; any array on the path switches to
/// any-element-satisfies semantics.
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Evaluate every enabled policy in priority order.
    ///
    /// Rules within one policy run in declared order; conditions are
    /// AND-combined left to right with short-circuit on the first failure.
    /// A policy with `stop_on_match` that produced at least one match stops
    /// evaluation of lower-priority policies.
    pub fn evaluate(event: &DlpEvent, catalog: &PolicyCatalog) -> EvaluationOutcome {
        let tree = match event.to_value() {
            Ok(tree) => tree,
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "Event could not be serialized for evaluation");
                return EvaluationOutcome::default();
            }
        };

        let mut outcome = EvaluationOutcome::default();

        for policy in catalog.policies() {
            if !policy.enabled {
                continue;
            }
            outcome.policies_evaluated += 1;
            let mut policy_matched = false;

            for rule in &policy.rules {
                outcome.rules_evaluated += 1;
                match Self::rule_matches(&tree, policy, rule, catalog) {
                    Ok(true) => {
                        policy_matched = true;
                        outcome.matches.push(PolicyMatch {
                            policy_id: policy.id.clone(),
                            policy_name: policy.name.clone(),
                            rule_id: rule.id.clone(),
                            rule_name: rule.name.clone(),
                            severity: policy.severity,
                            matched_at: Utc::now(),
                            actions: rule.actions.clone(),
                        });
                    }
                    Ok(false) => {}
                    Err(e) => {
                        // A broken rule never aborts the event
                        warn!(
                            policy_id = %policy.id,
                            rule_id = %rule.id,
                            error = %e,
                            "Rule evaluation failed, skipping rule"
                        );
                    }
                }
            }

            if policy.stop_on_match && policy_matched {
                debug!(policy_id = %policy.id, "stop_on_match set, ending evaluation");
                break;
            }
        }

        outcome
    }

    fn rule_matches(
        tree: &Value,
        policy: &Policy,
        rule: &Rule,
        catalog: &PolicyCatalog,
    ) -> PolicyResult<bool> {
        for (index, condition) in rule.conditions.iter().enumerate() {
            if !Self::condition_matches(tree, policy, rule, condition, index, catalog)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn condition_matches(
        tree: &Value,
        policy: &Policy,
        rule: &Rule,
        condition: &Condition,
        index: usize,
        catalog: &PolicyCatalog,
    ) -> PolicyResult<bool> {
        let resolved = resolve(tree, &condition.field);

        match condition.operator {
            ConditionOperator::Exists => return Ok(!resolved.is_empty()),
            ConditionOperator::NotExists => return Ok(resolved.is_empty()),
            _ => {}
        }

        // Unresolved fields satisfy only the presence operators
        if resolved.is_empty() {
            return Ok(false);
        }

        let expected = condition.value.as_ref().ok_or_else(|| {
            PolicyError::evaluation_error(format!(
                "operator {:?} reached evaluation without a value",
                condition.operator
            ))
        })?;

        let satisfied = match condition.operator {
            ConditionOperator::Equals => resolved.iter().any(|v| values_equal(v, expected)),
            ConditionOperator::NotEquals => resolved.iter().any(|v| !values_equal(v, expected)),
            ConditionOperator::Contains => resolved.iter().any(|v| contains(v, expected)),
            ConditionOperator::NotContains => resolved.iter().any(|v| !contains(v, expected)),
            ConditionOperator::StartsWith => resolved.iter().any(|v| {
                matches!((v.as_str(), expected.as_str()), (Some(s), Some(p)) if s.starts_with(p))
            }),
            ConditionOperator::EndsWith => resolved.iter().any(|v| {
                matches!((v.as_str(), expected.as_str()), (Some(s), Some(p)) if s.ends_with(p))
            }),
            ConditionOperator::Regex => {
                let compiled;
                let pattern = match catalog.pattern(&policy.id, &rule.id, index) {
                    Some(pattern) => pattern,
                    None => {
                        // Cache miss should not happen post-compilation;
                        // compile in place rather than dropping the rule.
                        let source = expected.as_str().ok_or_else(|| {
                            PolicyError::evaluation_error(
                                "regex operator requires a string value".to_string(),
                            )
                        })?;
                        compiled = Regex::new(source)
                            .map_err(|e| PolicyError::evaluation_error(e.to_string()))?;
                        &compiled
                    }
                };
                resolved
                    .iter()
                    .any(|v| v.as_str().map(|s| pattern.is_match(s)).unwrap_or(false))
            }
            ConditionOperator::In => {
                let list = expected.as_array().ok_or_else(|| {
                    PolicyError::evaluation_error("in operator requires a list".to_string())
                })?;
                resolved
                    .iter()
                    .any(|v| list.iter().any(|item| values_equal(v, item)))
            }
            ConditionOperator::NotIn => {
                let list = expected.as_array().ok_or_else(|| {
                    PolicyError::evaluation_error("not_in operator requires a list".to_string())
                })?;
                resolved
                    .iter()
                    .any(|v| !list.iter().any(|item| values_equal(v, item)))
            }
            ConditionOperator::GreaterThan => any_ordering(&resolved, expected, |o| o == Ordering::Greater),
            ConditionOperator::LessThan => any_ordering(&resolved, expected, |o| o == Ordering::Less),
            ConditionOperator::GreaterOrEqual => {
                any_ordering(&resolved, expected, |o| o != Ordering::Less)
            }
            ConditionOperator::LessOrEqual => {
                any_ordering(&resolved, expected, |o| o != Ordering::Greater)
            }
            ConditionOperator::Exists | ConditionOperator::NotExists => unreachable!(),
        };

        Ok(satisfied)
    }
}

/// Walk the dotted path through the JSON tree. Arrays anywhere on the path
/// fan resolution out over their elements.
fn resolve<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            if let Some(child) = map.get(segment) {
                                next.push(child);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Deep equality with integer/float coercion but no string/number coercion
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) if actual.is_number() && expected.is_number() => a == b,
        _ => actual == expected,
    }
}

/// `contains`: substring for strings, membership for arrays
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected.as_str().map(|p| s.contains(p)).unwrap_or(false),
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

/// Ordered comparison, defined for numbers and RFC 3339 timestamps only
fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    if actual.is_number() && expected.is_number() {
        return actual.as_f64()?.partial_cmp(&expected.as_f64()?);
    }
    if let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) {
        let a = DateTime::parse_from_rfc3339(a).ok()?.with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339(b).ok()?.with_timezone(&Utc);
        return Some(a.cmp(&b));
    }
    None
}

fn any_ordering(resolved: &[&Value], expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    resolved
        .iter()
        .any(|v| ordering(v, expected).map(&accept).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{ClassificationHit, EventType, Span};

    fn catalog_from_yaml(files: &[&str]) -> PolicyCatalog {
        let policies = files
            .iter()
            .map(|yaml| {
                serde_yaml::from_str::<crate::model::RawPolicyFile>(yaml)
                    .unwrap()
                    .validate()
                    .unwrap()
            })
            .collect();
        PolicyCatalog::compile(policies).unwrap()
    }

    fn event_with_credit_card_hit() -> DlpEvent {
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

    const CC_POLICY: &str = r#"
policy:
  id: credit-card-policy
  name: Credit Card Detection
  enabled: true
  priority: 10
  severity: critical
rules:
  - id: cc-rule-001
    name: Block Credit Cards
    conditions:
      - field: classification.type
        operator: equals
        value: credit_card
    actions:
      - type: alert
        severity: critical
      - type: block
"#;

    #[test]
    fn test_matching_event_produces_policy_match() {
        let catalog = catalog_from_yaml(&[CC_POLICY]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);

        assert_eq!(outcome.matches.len(), 1);
        let matched = &outcome.matches[0];
        assert_eq!(matched.policy_id, "credit-card-policy");
        assert_eq!(matched.rule_id, "cc-rule-001");
        assert_eq!(matched.actions.len(), 2);
    }

    #[test]
    fn test_non_matching_event() {
        let catalog = catalog_from_yaml(&[CC_POLICY]);
        let event = DlpEvent::new("evt-002", "agent-001", EventType::File);
        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_disabled_policy_is_skipped() {
        let disabled = r#"
policy:
  id: disabled-policy
  name: Disabled Test
  enabled: false
rules:
  - id: rule-001
    conditions:
      - field: event.type
        operator: equals
        value: clipboard
    actions:
      - type: alert
"#;
        let catalog = catalog_from_yaml(&[disabled]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.policies_evaluated, 0);
    }

    #[test]
    fn test_condition_equals_on_event_type() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: event.type
        operator: equals
        value: clipboard
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_contains_on_content() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: content
        operator: contains
        value: "card"
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_regex() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: content
        operator: regex
        value: '\d{16}'
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_regex_case_insensitive_flag() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: content
        operator: regex
        value: '(?i)PAYMENT'
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_greater_than_any_element() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: classification.confidence
        operator: greater_than
        value: 0.8
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);

        // Two hits, one above and one below the threshold: any-element wins
        let mut event = event_with_credit_card_hit();
        event.classification.push(ClassificationHit {
            hit_type: "phone".to_string(),
            label: "Phone Number".to_string(),
            confidence: 0.6,
            pattern_id: "nanp".to_string(),
            span: Span::new(0, 5),
            raw_match: None,
        });

        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_in_list() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: event.type
        operator: in
        value: [file, clipboard, usb]
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_condition_exists() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: classification
        operator: exists
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_unresolved_field_only_matches_presence_operators() {
        let not_exists = r#"
policy:
  id: p1
  name: P1
  enabled: true
rules:
  - id: r
    conditions:
      - field: file.signature
        operator: not_exists
    actions: []
"#;
        let equals_on_missing = r#"
policy:
  id: p2
  name: P2
  enabled: true
rules:
  - id: r
    conditions:
      - field: file.signature
        operator: equals
        value: anything
    actions: []
"#;
        let catalog = catalog_from_yaml(&[not_exists, equals_on_missing]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);

        let matched: Vec<&str> = outcome.matches.iter().map(|m| m.policy_id.as_str()).collect();
        assert_eq!(matched, vec!["p1"]);
    }

    #[test]
    fn test_multiple_conditions_are_anded() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: event.type
        operator: equals
        value: clipboard
      - field: classification.type
        operator: equals
        value: credit_card
    actions: []
  - id: r2
    conditions:
      - field: event.type
        operator: equals
        value: clipboard
      - field: classification.type
        operator: equals
        value: ssn
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].rule_id, "r");
        assert_eq!(outcome.rules_evaluated, 2);
    }

    #[test]
    fn test_no_string_number_coercion() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: metadata.attempts
        operator: equals
        value: "3"
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let mut event = event_with_credit_card_hit();
        event
            .metadata
            .insert("attempts".to_string(), serde_json::json!(3));

        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_integer_float_coercion() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: metadata.attempts
        operator: equals
        value: 3.0
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let mut event = event_with_credit_card_hit();
        event
            .metadata
            .insert("attempts".to_string(), serde_json::json!(3));

        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_timestamp_comparison() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: metadata.observed_at
        operator: greater_than
        value: "2024-01-01T00:00:00Z"
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let mut event = event_with_credit_card_hit();
        event.metadata.insert(
            "observed_at".to_string(),
            serde_json::json!("2025-06-15T10:30:00Z"),
        );

        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn test_ordered_comparator_false_for_non_numeric() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions:
      - field: event.type
        operator: greater_than
        value: 5
    actions: []
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_stop_on_match_halts_lower_priority_policies() {
        let first = r#"
policy:
  id: policy-a
  name: Policy A
  enabled: true
  priority: 10
  stop_on_match: true
rules:
  - id: r
    conditions:
      - field: classification.type
        operator: equals
        value: credit_card
    actions:
      - type: block
"#;
        let second = r#"
policy:
  id: policy-b
  name: Policy B
  enabled: true
  priority: 20
rules:
  - id: r
    conditions:
      - field: classification.type
        operator: equals
        value: credit_card
    actions:
      - type: alert
"#;
        let catalog = catalog_from_yaml(&[second, first]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].policy_id, "policy-a");
    }

    #[test]
    fn test_matches_come_out_in_priority_order() {
        let low = r#"
policy:
  id: zz-low
  name: Low priority
  enabled: true
  priority: 50
rules:
  - id: r
    conditions: []
    actions: []
"#;
        let high = r#"
policy:
  id: aa-high
  name: High priority
  enabled: true
  priority: 5
rules:
  - id: r
    conditions: []
    actions: []
"#;
        let tie = r#"
policy:
  id: ab-tie
  name: Tie breaker
  enabled: true
  priority: 5
rules:
  - id: r
    conditions: []
    actions: []
"#;
        let catalog = catalog_from_yaml(&[low, tie, high]);
        let outcome = RuleEvaluator::evaluate(&event_with_credit_card_hit(), &catalog);

        let order: Vec<&str> = outcome.matches.iter().map(|m| m.policy_id.as_str()).collect();
        assert_eq!(order, vec!["aa-high", "ab-tie", "zz-low"]);
    }

    #[test]
    fn test_empty_conditions_always_match() {
        let yaml = r#"
policy:
  id: p
  name: P
  enabled: true
rules:
  - id: r
    conditions: []
    actions:
      - type: audit
"#;
        let catalog = catalog_from_yaml(&[yaml]);
        let event = DlpEvent::new("evt-empty", "agent-001", EventType::File);
        let outcome = RuleEvaluator::evaluate(&event, &catalog);
        assert_eq!(outcome.matches.len(), 1);
    }
}
