//! Chain rule vocabulary: comparison operators, rule types, value mappings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// How a source field value is compared with a rule's trigger value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

impl ComparisonOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOperator::Equals => "equals",
            ComparisonOperator::NotEquals => "not_equals",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::NotContains => "not_contains",
            ComparisonOperator::StartsWith => "starts_with",
            ComparisonOperator::EndsWith => "ends_with",
            ComparisonOperator::GreaterThan => "greater_than",
            ComparisonOperator::LessThan => "less_than",
            ComparisonOperator::IsEmpty => "is_empty",
            ComparisonOperator::IsNotEmpty => "is_not_empty",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "equals" => Ok(ComparisonOperator::Equals),
            "not_equals" => Ok(ComparisonOperator::NotEquals),
            "contains" => Ok(ComparisonOperator::Contains),
            "not_contains" => Ok(ComparisonOperator::NotContains),
            "starts_with" => Ok(ComparisonOperator::StartsWith),
            "ends_with" => Ok(ComparisonOperator::EndsWith),
            "greater_than" => Ok(ComparisonOperator::GreaterThan),
            "less_than" => Ok(ComparisonOperator::LessThan),
            "is_empty" => Ok(ComparisonOperator::IsEmpty),
            "is_not_empty" => Ok(ComparisonOperator::IsNotEmpty),
            other => Err(CoreError::Validation(format!(
                "Invalid comparison_operator '{other}'"
            ))),
        }
    }

    /// Operators that test the source value alone and take no trigger value.
    pub fn is_value_less(self) -> bool {
        matches!(
            self,
            ComparisonOperator::IsEmpty | ComparisonOperator::IsNotEmpty
        )
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single trigger/target pair, or a lookup table of pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    #[default]
    Simple,
    BulkMapping,
}

impl RuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::Simple => "simple",
            RuleType::BulkMapping => "bulk_mapping",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "simple" => Ok(RuleType::Simple),
            "bulk_mapping" => Ok(RuleType::BulkMapping),
            other => Err(CoreError::Validation(format!(
                "Invalid rule_type '{other}'. Must be 'simple' or 'bulk_mapping'"
            ))),
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a bulk mapping as sent by a client; either side may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingInput {
    #[serde(default, deserialize_with = "scalar_text")]
    pub trigger_value: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub target_value: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

/// Deserialize a trigger or target value sent as a JSON string, number or
/// boolean. Numbers and booleans are kept in the text form the evaluator
/// compares against, so `100` and `"100"` are the same trigger.
pub fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(text) => text,
        Scalar::Number(number) => number.to_string(),
        Scalar::Bool(flag) => flag.to_string(),
    }))
}

/// A validated `trigger_value -> target_value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMapping {
    pub trigger_value: String,
    pub target_value: String,
}

/// The value payload of a rule after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValues {
    Simple {
        /// `None` for value-less operators.
        trigger_value: Option<String>,
        target_value: String,
    },
    Bulk(Vec<ValueMapping>),
}

impl RuleValues {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleValues::Simple { .. } => RuleType::Simple,
            RuleValues::Bulk(_) => RuleType::BulkMapping,
        }
    }

    /// Columns stored on the rule row itself; always `NULL` for bulk rules.
    pub fn row_values(&self) -> (Option<&str>, Option<&str>) {
        match self {
            RuleValues::Simple {
                trigger_value,
                target_value,
            } => (trigger_value.as_deref(), Some(target_value.as_str())),
            RuleValues::Bulk(_) => (None, None),
        }
    }

    pub fn mappings(&self) -> &[ValueMapping] {
        match self {
            RuleValues::Simple { .. } => &[],
            RuleValues::Bulk(mappings) => mappings,
        }
    }
}
