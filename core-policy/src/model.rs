// =====================================================================================
// File: core-policy/src/model.rs
// Description: Policy file model, validation, and the condition operator set
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::{PolicyError, PolicyResult};
use core_events::{Action, Severity};
use serde::{Deserialize, Serialize};

/// Default priority for policies that do not declare one (lower = earlier)
pub const DEFAULT_PRIORITY: i32 = 100;

/// Closed set of condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Exists,
    NotExists,
}

impl ConditionOperator {
    /// Operators that evaluate field presence alone and take no value
    pub fn is_unary(&self) -> bool {
        matches!(self, ConditionOperator::Exists | ConditionOperator::NotExists)
    }

    /// Operators whose value must be a literal list
    pub fn requires_list(&self) -> bool {
        matches!(self, ConditionOperator::In | ConditionOperator::NotIn)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "not_contains" => Some(Self::NotContains),
            "starts_with" => Some(Self::StartsWith),
            "ends_with" => Some(Self::EndsWith),
            "regex" => Some(Self::Regex),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            "greater_than" => Some(Self::GreaterThan),
            "less_than" => Some(Self::LessThan),
            "greater_or_equal" => Some(Self::GreaterOrEqual),
            "less_or_equal" => Some(Self::LessOrEqual),
            "exists" => Some(Self::Exists),
            "not_exists" => Some(Self::NotExists),
            _ => None,
        }
    }
}

/// One validated condition: a dotted field path, an operator, and the value
/// the operator compares against (absent for unary operators)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// One validated rule: AND-combined conditions plus an ordered action plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// One validated policy, ready for compilation into the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub priority: i32,
    pub severity: Severity,
    pub stop_on_match: bool,
    pub rules: Vec<Rule>,
}

// ---------------------------------------------------------------------------
// Lenient on-disk shapes. Policy files are parsed into these first so that
// structural problems surface as validation errors rather than parse errors.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPolicyFile {
    pub policy: Option<RawPolicyHeader>,
    pub rules: Option<Vec<RawRule>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPolicyHeader {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub severity: Option<String>,
    pub stop_on_match: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRule {
    pub id: Option<String>,
    pub name: Option<String>,
    pub conditions: Option<Vec<RawCondition>>,
    pub actions: Option<Vec<serde_yaml::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<serde_yaml::Value>,
}

impl RawPolicyFile {
    /// Validate the raw file and produce a strict [`Policy`].
    ///
    /// Required: a `policy` section with `id` and `name`, and a `rules`
    /// section (which may be an empty list). Each rule needs `id`,
    /// `conditions` (empty means always match), and `actions`. Every
    /// condition needs `field` and `operator`; every non-unary operator
    /// needs a `value`; `in`/`not_in` values must be lists. Regex values are
    /// checked for compilability here and compiled into the catalog cache
    /// later.
    pub fn validate(self) -> PolicyResult<Policy> {
        let header = self
            .policy
            .ok_or_else(|| PolicyError::validation_error("policy", "section is required"))?;
        let rules = self
            .rules
            .ok_or_else(|| PolicyError::validation_error("rules", "section is required"))?;

        let id = required_string(header.id, "policy.id")?;
        let name = required_string(header.name, "policy.name")?;
        let enabled = header
            .enabled
            .ok_or_else(|| PolicyError::validation_error("policy.enabled", "is required"))?;
        let severity = header
            .severity
            .map(|s| Severity::parse_lenient(&s))
            .unwrap_or(Severity::Medium);

        let mut validated_rules = Vec::with_capacity(rules.len());
        let mut seen_rule_ids = std::collections::HashSet::new();

        for (index, rule) in rules.into_iter().enumerate() {
            let rule_field = format!("rules[{}]", index);
            let rule_id = required_string(rule.id, &format!("{}.id", rule_field))?;
            if !seen_rule_ids.insert(rule_id.clone()) {
                return Err(PolicyError::validation_error(
                    format!("{}.id", rule_field),
                    format!("duplicate rule id '{}'", rule_id),
                ));
            }
            let rule_name = rule.name.unwrap_or_else(|| rule_id.clone());

            let raw_conditions = rule.conditions.ok_or_else(|| {
                PolicyError::validation_error(
                    format!("{}.conditions", rule_field),
                    "is required (an empty list means always match)".to_string(),
                )
            })?;
            let raw_actions = rule.actions.ok_or_else(|| {
                PolicyError::validation_error(
                    format!("{}.actions", rule_field),
                    "is required".to_string(),
                )
            })?;

            let mut conditions = Vec::with_capacity(raw_conditions.len());
            for (cond_index, condition) in raw_conditions.into_iter().enumerate() {
                let cond_field = format!("{}.conditions[{}]", rule_field, cond_index);
                conditions.push(validate_condition(condition, &cond_field)?);
            }

            let mut actions = Vec::with_capacity(raw_actions.len());
            for (action_index, action_value) in raw_actions.into_iter().enumerate() {
                let action: Action = serde_yaml::from_value(action_value).map_err(|e| {
                    PolicyError::validation_error(
                        format!("{}.actions[{}]", rule_field, action_index),
                        e.to_string(),
                    )
                })?;
                actions.push(action);
            }

            validated_rules.push(Rule {
                id: rule_id,
                name: rule_name,
                conditions,
                actions,
            });
        }

        Ok(Policy {
            id,
            name,
            description: header.description,
            enabled,
            priority: header.priority.unwrap_or(DEFAULT_PRIORITY),
            severity,
            stop_on_match: header.stop_on_match.unwrap_or(false),
            rules: validated_rules,
        })
    }
}

fn required_string(value: Option<String>, field: &str) -> PolicyResult<String> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(PolicyError::validation_error(field, "is required")),
    }
}

fn validate_condition(raw: RawCondition, cond_field: &str) -> PolicyResult<Condition> {
    let field = required_string(raw.field, &format!("{}.field", cond_field))?;
    let operator_name = required_string(raw.operator, &format!("{}.operator", cond_field))?;
    let operator = ConditionOperator::parse(&operator_name).ok_or_else(|| {
        PolicyError::validation_error(
            format!("{}.operator", cond_field),
            format!("unknown operator '{}'", operator_name),
        )
    })?;

    let value = match raw.value {
        Some(v) => Some(serde_json::to_value(v).map_err(|e| {
            PolicyError::validation_error(format!("{}.value", cond_field), e.to_string())
        })?),
        None => None,
    };

    if !operator.is_unary() && value.is_none() {
        return Err(PolicyError::validation_error(
            format!("{}.value", cond_field),
            format!("operator '{:?}' requires a value", operator),
        ));
    }

    if operator.requires_list() && !matches!(value, Some(serde_json::Value::Array(_))) {
        return Err(PolicyError::validation_error(
            format!("{}.value", cond_field),
            "operator requires a literal list".to_string(),
        ));
    }

    if operator == ConditionOperator::Regex {
        let pattern = value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PolicyError::validation_error(
                    format!("{}.value", cond_field),
                    "regex operator requires a string value".to_string(),
                )
            })?;
        regex::Regex::new(pattern).map_err(|e| {
            PolicyError::pattern_error(cond_field.to_string(), e.to_string())
        })?;
    }

    Ok(Condition {
        field,
        operator,
        value,
    })
}
