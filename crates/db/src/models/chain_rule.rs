//! Chain rule and value-mapping models and DTOs.

use crm_core::chain_rule::rules::{scalar_text, ComparisonOperator, MappingInput, RuleValues};
use crm_core::field::Module;
use crm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `chain_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChainRule {
    pub id: DbId,
    pub rule_name: String,
    pub module: String,
    pub source_field_id: DbId,
    pub target_field_id: DbId,
    pub comparison_operator: String,
    pub rule_type: String,
    pub trigger_value: Option<String>,
    pub target_value: Option<String>,
    pub is_active: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `chain_rule_mappings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChainRuleMapping {
    pub id: DbId,
    pub rule_id: DbId,
    pub trigger_value: String,
    pub target_value: String,
    pub sort_order: i32,
}

/// A chain rule joined with its source/target field metadata.
///
/// `mappings` is filled for `bulk_mapping` rules and `None` otherwise.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChainRuleWithFields {
    pub id: DbId,
    pub rule_name: String,
    pub module: String,
    pub source_field_id: DbId,
    pub target_field_id: DbId,
    pub comparison_operator: String,
    pub rule_type: String,
    pub trigger_value: Option<String>,
    pub target_value: Option<String>,
    pub is_active: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub source_field_label: String,
    pub source_field_name: String,
    pub source_field_type: String,
    pub target_field_label: String,
    pub target_field_name: String,
    pub target_field_type: String,
    #[sqlx(skip)]
    pub mappings: Option<Vec<ChainRuleMapping>>,
}

// ---------------------------------------------------------------------------
// DTOs (request payloads)
// ---------------------------------------------------------------------------

/// Request body for `POST /chain-rules`.
///
/// All keys are optional at the serde level; presence is checked by
/// [`crm_core::chain_rule::validation`] so missing keys produce 400s.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChainRule {
    pub rule_name: Option<String>,
    pub module: Option<String>,
    pub source_field_id: Option<DbId>,
    pub target_field_id: Option<DbId>,
    pub comparison_operator: Option<String>,
    pub rule_type: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub trigger_value: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub target_value: Option<String>,
    pub bulk_mappings: Option<Vec<MappingInput>>,
}

/// Request body for `PUT /chain-rules/{id}`. `module`, `source_field_id` and
/// `rule_type` are fixed at creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChainRule {
    pub rule_name: Option<String>,
    pub target_field_id: Option<DbId>,
    pub comparison_operator: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub trigger_value: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub target_value: Option<String>,
    pub bulk_mappings: Option<Vec<MappingInput>>,
}

/// Request body for `PUT /chain-rules/{id}/active`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetChainRuleActive {
    pub is_active: bool,
}

/// Query parameters for `GET /chain-rules`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainRuleListParams {
    pub module: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated payloads handed to the repository
// ---------------------------------------------------------------------------

/// A fully validated rule ready to insert.
#[derive(Debug, Clone)]
pub struct NewChainRule {
    pub rule_name: String,
    pub module: Module,
    pub source_field_id: DbId,
    pub target_field_id: DbId,
    pub operator: ComparisonOperator,
    pub values: RuleValues,
    pub created_by: Option<DbId>,
}

/// A fully validated replacement for a rule's mutable columns.
#[derive(Debug, Clone)]
pub struct ChainRuleChanges {
    pub rule_name: String,
    pub target_field_id: DbId,
    pub operator: ComparisonOperator,
    pub values: RuleValues,
}

/// What an update did to target-field read-only flags.
#[derive(Debug, Clone)]
pub struct RuleUpdateOutcome {
    pub rule: ChainRule,
    /// Set when the target moved; the field that was targeted before.
    pub previous_target_field_id: Option<DbId>,
    /// Whether the previous target lost its read-only flag.
    pub previous_target_released: bool,
}

/// What a delete did to the target field.
#[derive(Debug, Clone, Copy)]
pub struct RuleDeleteOutcome {
    pub target_field_id: DbId,
    /// Whether the target lost its read-only flag.
    pub target_released: bool,
}
