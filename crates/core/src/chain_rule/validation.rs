//! Input validation for chain rule mutations.
//!
//! Checks run in a fixed order so clients always see the first problem:
//! required fields, then source/target distinctness, then the
//! rule-type-specific value checks.

use crate::error::CoreError;
use crate::types::DbId;

use super::rules::{ComparisonOperator, MappingInput, RuleType, RuleValues, ValueMapping};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Required fields for creating a rule, returned trimmed as
/// `(rule_name, module, source_field_id, target_field_id)`.
pub fn require_create_fields<'a>(
    rule_name: Option<&'a str>,
    module: Option<&'a str>,
    source_field_id: Option<DbId>,
    target_field_id: Option<DbId>,
) -> Result<(&'a str, &'a str, DbId, DbId), CoreError> {
    match (non_blank(rule_name), non_blank(module), source_field_id, target_field_id) {
        (Some(name), Some(module), Some(source), Some(target)) => Ok((name, module, source, target)),
        _ => Err(CoreError::Validation(
            "rule_name, module, source_field_id and target_field_id are required".into(),
        )),
    }
}

/// Required fields for updating a rule. `module` and `source_field_id` are
/// fixed at creation and never sent.
pub fn require_update_fields(
    rule_name: Option<&str>,
    target_field_id: Option<DbId>,
) -> Result<(&str, DbId), CoreError> {
    match (non_blank(rule_name), target_field_id) {
        (Some(name), Some(target)) => Ok((name, target)),
        _ => Err(CoreError::Validation(
            "rule_name and target_field_id are required".into(),
        )),
    }
}

/// A rule may not write back into the field it reads.
pub fn ensure_distinct_fields(source_field_id: DbId, target_field_id: DbId) -> Result<(), CoreError> {
    if source_field_id == target_field_id {
        return Err(CoreError::Validation(
            "source_field_id and target_field_id must be different fields".into(),
        ));
    }
    Ok(())
}

/// Validate the value payload for the given rule type and operator.
///
/// Simple rules need a `target_value`, and a `trigger_value` unless the
/// operator is value-less (the trigger is then dropped). Bulk rules need a
/// non-empty mapping list where every entry carries both values.
pub fn validate_rule_values(
    rule_type: RuleType,
    operator: ComparisonOperator,
    trigger_value: Option<&str>,
    target_value: Option<&str>,
    bulk_mappings: Option<&[MappingInput]>,
) -> Result<RuleValues, CoreError> {
    match rule_type {
        RuleType::Simple => {
            let trigger_value = if operator.is_value_less() {
                None
            } else {
                match trigger_value {
                    Some(v) if !v.trim().is_empty() => Some(v.to_string()),
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "trigger_value is required for operator '{operator}'"
                        )))
                    }
                }
            };
            let target_value = match target_value {
                Some(v) if !v.trim().is_empty() => v.to_string(),
                _ => {
                    return Err(CoreError::Validation(
                        "target_value is required for simple rules".into(),
                    ))
                }
            };
            Ok(RuleValues::Simple {
                trigger_value,
                target_value,
            })
        }
        RuleType::BulkMapping => {
            let inputs = bulk_mappings.unwrap_or_default();
            if inputs.is_empty() {
                return Err(CoreError::Validation(
                    "bulk_mappings must contain at least one mapping".into(),
                ));
            }
            let mut mappings = Vec::with_capacity(inputs.len());
            for (index, input) in inputs.iter().enumerate() {
                match (input.trigger_value.as_deref(), input.target_value.as_deref()) {
                    (Some(trigger), Some(target))
                        if !trigger.trim().is_empty() && !target.trim().is_empty() =>
                    {
                        mappings.push(ValueMapping {
                            trigger_value: trigger.to_string(),
                            target_value: target.to_string(),
                        });
                    }
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "bulk_mappings[{index}] must have both trigger_value and target_value"
                        )))
                    }
                }
            }
            Ok(RuleValues::Bulk(mappings))
        }
    }
}
