//! Custom field definition model and DTOs.

use crm_core::field::{FieldType, Module};
use crm_core::patch::Patch;
use crm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `field_definitions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FieldDefinition {
    pub id: DbId,
    pub module: String,
    pub field_name: String,
    pub field_label: String,
    pub field_type: String,
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub is_read_only: bool,
    pub options: Option<Vec<String>>,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for `POST /field-definitions`.
///
/// Everything is optional at the serde level so missing keys surface as
/// validation errors rather than extractor rejections. `is_read_only` is not
/// accepted; it is owned by chain rules.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFieldDefinition {
    pub module: Option<String>,
    pub field_label: Option<String>,
    pub field_type: Option<String>,
    pub placeholder: Option<String>,
    pub is_required: Option<bool>,
    pub options: Option<Vec<String>>,
    pub sort_order: Option<i32>,
}

/// Validated insert payload.
#[derive(Debug, Clone)]
pub struct NewFieldDefinition {
    pub module: Module,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub options: Option<Vec<String>>,
    pub sort_order: i32,
}

/// Request body for `PUT /field-definitions/{id}`.
///
/// Missing keys leave the column unchanged; `null` clears nullable columns.
/// `module` cannot change after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFieldDefinition {
    #[serde(default)]
    pub field_label: Patch<String>,
    #[serde(default)]
    pub field_type: Patch<String>,
    #[serde(default)]
    pub placeholder: Patch<String>,
    #[serde(default)]
    pub is_required: Patch<bool>,
    #[serde(default)]
    pub options: Patch<Vec<String>>,
    #[serde(default)]
    pub sort_order: Patch<i32>,
}

/// Resolved column changes. `None` means "do not touch".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDefinitionChanges {
    pub field_label: Option<String>,
    pub field_name: Option<String>,
    pub field_type: Option<FieldType>,
    pub placeholder: Option<Option<String>>,
    pub is_required: Option<bool>,
    pub options: Option<Option<Vec<String>>>,
    pub sort_order: Option<i32>,
}

impl FieldDefinitionChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query parameters for `GET /field-definitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinitionListParams {
    pub module: Option<String>,
}
