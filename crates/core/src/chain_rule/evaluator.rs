//! Chain rule evaluator. Pure logic, no database access.
//!
//! Rules are applied in the order given. Each assignment is written back into
//! the working record before the next rule runs, so a rule whose source is
//! another rule's target sees the assigned value.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::DbId;

use super::rules::{ComparisonOperator, RuleValues};

/// An active rule resolved to field names, ready to evaluate.
#[derive(Debug, Clone)]
pub struct EvaluationRule {
    pub id: DbId,
    pub source_field: String,
    pub target_field: String,
    pub operator: ComparisonOperator,
    pub values: RuleValues,
}

/// A value written to a target field by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub rule_id: DbId,
    pub field_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub assignments: Vec<Assignment>,
    pub record: Map<String, Value>,
}

/// Apply `rules` to a copy of `record`.
pub fn evaluate(rules: &[EvaluationRule], record: &Map<String, Value>) -> EvaluationOutcome {
    let mut working = record.clone();
    let mut assignments = Vec::new();

    for rule in rules {
        let source = stringify(working.get(&rule.source_field));
        let Some(value) = resolve(rule, &source) else {
            continue;
        };
        working.insert(rule.target_field.clone(), Value::String(value.clone()));
        assignments.push(Assignment {
            rule_id: rule.id,
            field_name: rule.target_field.clone(),
            value,
        });
    }

    EvaluationOutcome {
        assignments,
        record: working,
    }
}

/// The value a rule assigns for the given source value, if it fires.
fn resolve(rule: &EvaluationRule, source: &str) -> Option<String> {
    match &rule.values {
        RuleValues::Simple {
            trigger_value,
            target_value,
        } => {
            let trigger = trigger_value.as_deref().unwrap_or("");
            matches(rule.operator, source, trigger).then(|| target_value.clone())
        }
        // Bulk rules are lookup tables; the first exact match wins.
        RuleValues::Bulk(mappings) => mappings
            .iter()
            .find(|m| m.trigger_value == source)
            .map(|m| m.target_value.clone()),
    }
}

/// Compare a source value with a trigger value under `operator`.
pub fn matches(operator: ComparisonOperator, source: &str, trigger: &str) -> bool {
    match operator {
        ComparisonOperator::Equals => source == trigger,
        ComparisonOperator::NotEquals => source != trigger,
        ComparisonOperator::Contains => source.contains(trigger),
        ComparisonOperator::NotContains => !source.contains(trigger),
        ComparisonOperator::StartsWith => source.starts_with(trigger),
        ComparisonOperator::EndsWith => source.ends_with(trigger),
        ComparisonOperator::GreaterThan => compare(source, trigger).is_gt(),
        ComparisonOperator::LessThan => compare(source, trigger).is_lt(),
        ComparisonOperator::IsEmpty => source.trim().is_empty(),
        ComparisonOperator::IsNotEmpty => !source.trim().is_empty(),
    }
}

/// Numeric ordering when both sides parse as numbers, lexicographic otherwise.
fn compare(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Render a JSON value the way it is compared against trigger values.
fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| stringify(Some(v)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}
