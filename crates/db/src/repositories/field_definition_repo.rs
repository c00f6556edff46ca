//! Repository for the `field_definitions` table.
//!
//! `is_read_only` is never written here; [`super::ChainRuleRepo`] owns it.

use crm_core::types::DbId;
use sqlx::PgPool;

use crate::models::field_definition::{
    FieldDefinition, FieldDefinitionChanges, NewFieldDefinition,
};
use crate::update_set::UpdateSet;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, module, field_name, field_label, field_type, placeholder, \
    is_required, is_read_only, options, sort_order, created_at, updated_at";

/// Provides CRUD operations for custom field definitions.
pub struct FieldDefinitionRepo;

impl FieldDefinitionRepo {
    /// Insert a new field definition, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &NewFieldDefinition,
    ) -> Result<FieldDefinition, sqlx::Error> {
        let query = format!(
            "INSERT INTO field_definitions \
                (module, field_name, field_label, field_type, placeholder, \
                 is_required, options, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FieldDefinition>(&query)
            .bind(input.module.as_str())
            .bind(&input.field_name)
            .bind(&input.field_label)
            .bind(input.field_type.as_str())
            .bind(&input.placeholder)
            .bind(input.is_required)
            .bind(&input.options)
            .bind(input.sort_order)
            .fetch_one(pool)
            .await
    }

    /// Find a field definition by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<FieldDefinition>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM field_definitions WHERE id = $1");
        sqlx::query_as::<_, FieldDefinition>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List field definitions, optionally restricted to one module.
    pub async fn list(
        pool: &PgPool,
        module: Option<&str>,
    ) -> Result<Vec<FieldDefinition>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM field_definitions \
             WHERE ($1::TEXT IS NULL OR module = $1) \
             ORDER BY module, sort_order, id"
        );
        sqlx::query_as::<_, FieldDefinition>(&query)
            .bind(module)
            .fetch_all(pool)
            .await
    }

    /// Apply the changed columns. Returns `None` if no row with `id` exists.
    ///
    /// With no changes the current row is returned untouched.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        changes: &FieldDefinitionChanges,
    ) -> Result<Option<FieldDefinition>, sqlx::Error> {
        if changes.is_empty() {
            return Self::find_by_id(pool, id).await;
        }

        let mut update = UpdateSet::new("field_definitions");
        if let Some(label) = &changes.field_label {
            update.set("field_label", label.clone());
        }
        if let Some(name) = &changes.field_name {
            update.set("field_name", name.clone());
        }
        if let Some(field_type) = changes.field_type {
            update.set("field_type", field_type.as_str());
        }
        if let Some(placeholder) = &changes.placeholder {
            update.set("placeholder", placeholder.clone());
        }
        if let Some(is_required) = changes.is_required {
            update.set("is_required", is_required);
        }
        if let Some(options) = &changes.options {
            update.set("options", options.clone());
        }
        if let Some(sort_order) = changes.sort_order {
            update.set("sort_order", sort_order);
        }

        let mut builder = update.finish(id, COLUMNS);
        builder
            .build_query_as::<FieldDefinition>()
            .fetch_optional(pool)
            .await
    }

    /// Hard-delete a field definition. Returns `true` if a row was deleted.
    ///
    /// Fails with a foreign-key violation while any chain rule references it.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM field_definitions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
