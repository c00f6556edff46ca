//! Repository for the `chain_rules` and `chain_rule_mappings` tables.
//!
//! Every mutation runs in one transaction together with the read-only
//! recomputation of the affected target fields, keeping
//! `field_definitions.is_read_only` true exactly while an active rule
//! targets the field. Target field rows are locked (`FOR UPDATE`) before
//! they are inspected so concurrent mutations on the same target serialize.

use std::collections::HashMap;

use crm_core::chain_rule::rules::{RuleType, ValueMapping};
use crm_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::chain_rule::{
    ChainRule, ChainRuleChanges, ChainRuleMapping, ChainRuleWithFields, NewChainRule,
    RuleDeleteOutcome, RuleUpdateOutcome,
};

type PgTransaction<'c> = sqlx::Transaction<'c, Postgres>;

/// Column list for the `chain_rules` table.
const COLUMNS: &str = "id, rule_name, module, source_field_id, target_field_id, \
    comparison_operator, rule_type, trigger_value, target_value, is_active, \
    created_by, created_at, updated_at";

/// Column list for rules joined with their source (`sf`) and target (`tf`) fields.
const JOINED_COLUMNS: &str = "r.id, r.rule_name, r.module, r.source_field_id, \
    r.target_field_id, r.comparison_operator, r.rule_type, r.trigger_value, \
    r.target_value, r.is_active, r.created_by, r.created_at, r.updated_at, \
    sf.field_label AS source_field_label, sf.field_name AS source_field_name, \
    sf.field_type AS source_field_type, \
    tf.field_label AS target_field_label, tf.field_name AS target_field_name, \
    tf.field_type AS target_field_type";

const JOINED_FROM: &str = "FROM chain_rules r \
    JOIN field_definitions sf ON sf.id = r.source_field_id \
    JOIN field_definitions tf ON tf.id = r.target_field_id";

/// Column list for the `chain_rule_mappings` table.
const MAPPING_COLUMNS: &str = "id, rule_id, trigger_value, target_value, sort_order";

/// Provides chain rule CRUD with read-only propagation.
pub struct ChainRuleRepo;

impl ChainRuleRepo {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Find a bare rule row by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ChainRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chain_rules WHERE id = $1");
        sqlx::query_as::<_, ChainRule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a rule with joined field metadata and, for bulk rules, its mappings.
    pub async fn find_with_fields(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ChainRuleWithFields>, sqlx::Error> {
        let query = format!("SELECT {JOINED_COLUMNS} {JOINED_FROM} WHERE r.id = $1");
        let rule = sqlx::query_as::<_, ChainRuleWithFields>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match rule {
            Some(rule) => {
                let mut rules = [rule];
                Self::attach_mappings(pool, &mut rules).await?;
                let [rule] = rules;
                Ok(Some(rule))
            }
            None => Ok(None),
        }
    }

    /// List rules with joined field metadata, optionally for one module.
    pub async fn list(
        pool: &PgPool,
        module: Option<&str>,
    ) -> Result<Vec<ChainRuleWithFields>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} {JOINED_FROM} \
             WHERE ($1::TEXT IS NULL OR r.module = $1) \
             ORDER BY r.id"
        );
        let mut rules = sqlx::query_as::<_, ChainRuleWithFields>(&query)
            .bind(module)
            .fetch_all(pool)
            .await?;
        Self::attach_mappings(pool, &mut rules).await?;
        Ok(rules)
    }

    /// List the active rules of a module in evaluation order.
    pub async fn list_active(
        pool: &PgPool,
        module: &str,
    ) -> Result<Vec<ChainRuleWithFields>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} {JOINED_FROM} \
             WHERE r.module = $1 AND r.is_active = true \
             ORDER BY r.id"
        );
        let mut rules = sqlx::query_as::<_, ChainRuleWithFields>(&query)
            .bind(module)
            .fetch_all(pool)
            .await?;
        Self::attach_mappings(pool, &mut rules).await?;
        Ok(rules)
    }

    /// List the value mappings of one rule in insertion order.
    pub async fn list_mappings(
        pool: &PgPool,
        rule_id: DbId,
    ) -> Result<Vec<ChainRuleMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {MAPPING_COLUMNS} FROM chain_rule_mappings \
             WHERE rule_id = $1 \
             ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, ChainRuleMapping>(&query)
            .bind(rule_id)
            .fetch_all(pool)
            .await
    }

    /// Count rules that use a field as source or target.
    pub async fn count_referencing_field(
        pool: &PgPool,
        field_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chain_rules \
             WHERE source_field_id = $1 OR target_field_id = $1",
        )
        .bind(field_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert a rule, its mappings, and mark the target field read-only.
    pub async fn create(pool: &PgPool, input: &NewChainRule) -> Result<ChainRule, sqlx::Error> {
        let mut tx = pool.begin().await?;

        Self::lock_fields(&mut tx, &[input.target_field_id]).await?;

        let (trigger_value, target_value) = input.values.row_values();
        let query = format!(
            "INSERT INTO chain_rules \
                (rule_name, module, source_field_id, target_field_id, comparison_operator, \
                 rule_type, trigger_value, target_value, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        let rule = sqlx::query_as::<_, ChainRule>(&query)
            .bind(&input.rule_name)
            .bind(input.module.as_str())
            .bind(input.source_field_id)
            .bind(input.target_field_id)
            .bind(input.operator.as_str())
            .bind(input.values.rule_type().as_str())
            .bind(trigger_value)
            .bind(target_value)
            .bind(input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        Self::insert_mappings(&mut tx, rule.id, input.values.mappings()).await?;
        Self::mark_read_only(&mut tx, rule.target_field_id).await?;

        tx.commit().await?;
        Ok(rule)
    }

    /// Replace a rule's mutable columns (and mappings for bulk rules).
    ///
    /// When the target moves, the old target is released unless another
    /// active rule still targets it. The new target is marked read-only only
    /// while this rule is active: `is_read_only` holds exactly while some
    /// active rule targets a field, so an inactive rule's new target stays
    /// editable until [`Self::set_active`] turns the rule on.
    ///
    /// Runs in one transaction; any failure leaves the rule, its mappings and
    /// both fields' flags as they were. Returns `None` if no rule with `id`
    /// exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        changes: &ChainRuleChanges,
    ) -> Result<Option<RuleUpdateOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_rule(&mut tx, id).await? else {
            return Ok(None);
        };

        let target_changed = current.target_field_id != changes.target_field_id;
        if target_changed {
            Self::lock_fields(&mut tx, &[current.target_field_id, changes.target_field_id])
                .await?;
        } else {
            Self::lock_fields(&mut tx, &[current.target_field_id]).await?;
        }

        let (trigger_value, target_value) = changes.values.row_values();
        let query = format!(
            "UPDATE chain_rules SET \
                rule_name = $2, \
                target_field_id = $3, \
                comparison_operator = $4, \
                trigger_value = $5, \
                target_value = $6 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let rule = sqlx::query_as::<_, ChainRule>(&query)
            .bind(id)
            .bind(&changes.rule_name)
            .bind(changes.target_field_id)
            .bind(changes.operator.as_str())
            .bind(trigger_value)
            .bind(target_value)
            .fetch_one(&mut *tx)
            .await?;

        if rule.rule_type == RuleType::BulkMapping.as_str() {
            Self::replace_mappings(&mut tx, id, changes.values.mappings()).await?;
        }

        let mut previous_target_released = false;
        if target_changed {
            if rule.is_active {
                Self::mark_read_only(&mut tx, rule.target_field_id).await?;
            }
            previous_target_released =
                Self::release_if_untargeted(&mut tx, current.target_field_id, id).await?;
        }

        tx.commit().await?;
        Ok(Some(RuleUpdateOutcome {
            rule,
            previous_target_field_id: target_changed.then_some(current.target_field_id),
            previous_target_released,
        }))
    }

    /// Delete a rule and its mappings, releasing the target if it is no
    /// longer targeted. Returns `None` if no rule with `id` exists.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<Option<RuleDeleteOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_rule(&mut tx, id).await? else {
            return Ok(None);
        };
        Self::lock_fields(&mut tx, &[current.target_field_id]).await?;

        sqlx::query("DELETE FROM chain_rule_mappings WHERE rule_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chain_rules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let target_released =
            Self::release_if_untargeted(&mut tx, current.target_field_id, id).await?;

        tx.commit().await?;
        Ok(Some(RuleDeleteOutcome {
            target_field_id: current.target_field_id,
            target_released,
        }))
    }

    /// Activate or deactivate a rule and recompute its target's flag.
    ///
    /// Returns the updated rule and whether the target was released, or
    /// `None` if no rule with `id` exists.
    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<(ChainRule, bool)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_rule(&mut tx, id).await? else {
            return Ok(None);
        };
        Self::lock_fields(&mut tx, &[current.target_field_id]).await?;

        let query = format!(
            "UPDATE chain_rules SET is_active = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let rule = sqlx::query_as::<_, ChainRule>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_one(&mut *tx)
            .await?;

        let released = if is_active {
            Self::mark_read_only(&mut tx, rule.target_field_id).await?;
            false
        } else {
            Self::release_if_untargeted(&mut tx, rule.target_field_id, id).await?
        };

        tx.commit().await?;
        Ok(Some((rule, released)))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Load mappings for every bulk rule in `rules` with one query.
    async fn attach_mappings(
        pool: &PgPool,
        rules: &mut [ChainRuleWithFields],
    ) -> Result<(), sqlx::Error> {
        let bulk_ids: Vec<DbId> = rules
            .iter()
            .filter(|r| r.rule_type == RuleType::BulkMapping.as_str())
            .map(|r| r.id)
            .collect();
        if bulk_ids.is_empty() {
            return Ok(());
        }

        let query = format!(
            "SELECT {MAPPING_COLUMNS} FROM chain_rule_mappings \
             WHERE rule_id = ANY($1) \
             ORDER BY rule_id, sort_order, id"
        );
        let rows = sqlx::query_as::<_, ChainRuleMapping>(&query)
            .bind(&bulk_ids)
            .fetch_all(pool)
            .await?;

        let mut by_rule: HashMap<DbId, Vec<ChainRuleMapping>> = HashMap::new();
        for row in rows {
            by_rule.entry(row.rule_id).or_default().push(row);
        }
        for rule in rules
            .iter_mut()
            .filter(|r| r.rule_type == RuleType::BulkMapping.as_str())
        {
            rule.mappings = Some(by_rule.remove(&rule.id).unwrap_or_default());
        }
        Ok(())
    }

    /// Lock a rule row for the rest of the transaction.
    async fn lock_rule(
        tx: &mut PgTransaction<'_>,
        id: DbId,
    ) -> Result<Option<ChainRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chain_rules WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ChainRule>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock field rows in ascending id order.
    async fn lock_fields(tx: &mut PgTransaction<'_>, field_ids: &[DbId]) -> Result<(), sqlx::Error> {
        let mut ids = field_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        sqlx::query("SELECT id FROM field_definitions WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut **tx)
            .await?;
        Ok(())
    }

    async fn mark_read_only(tx: &mut PgTransaction<'_>, field_id: DbId) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE field_definitions SET is_read_only = true \
             WHERE id = $1 AND is_read_only = false",
        )
        .bind(field_id)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() > 0 {
            tracing::debug!(field_id, "Field marked read-only");
        }
        Ok(())
    }

    /// Clear a field's read-only flag unless another active rule (other than
    /// `excluding_rule_id`) still targets it. Returns `true` if it was cleared.
    async fn release_if_untargeted(
        tx: &mut PgTransaction<'_>,
        field_id: DbId,
        excluding_rule_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE field_definitions SET is_read_only = false \
             WHERE id = $1 \
               AND is_read_only = true \
               AND NOT EXISTS ( \
                   SELECT 1 FROM chain_rules \
                   WHERE target_field_id = $1 AND is_active = true AND id <> $2 \
               )",
        )
        .bind(field_id)
        .bind(excluding_rule_id)
        .execute(&mut **tx)
        .await?;
        let released = result.rows_affected() > 0;
        if released {
            tracing::debug!(field_id, "Field released from read-only");
        }
        Ok(released)
    }

    /// Bulk-insert mappings for a rule, preserving their order.
    async fn insert_mappings(
        tx: &mut PgTransaction<'_>,
        rule_id: DbId,
        mappings: &[ValueMapping],
    ) -> Result<(), sqlx::Error> {
        if mappings.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO chain_rule_mappings (rule_id, trigger_value, target_value, sort_order) ",
        );
        builder.push_values(mappings.iter().enumerate(), |mut row, (index, mapping)| {
            row.push_bind(rule_id)
                .push_bind(mapping.trigger_value.as_str())
                .push_bind(mapping.target_value.as_str())
                .push_bind(index as i32);
        });
        builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Delete every mapping of a rule and insert the new set.
    async fn replace_mappings(
        tx: &mut PgTransaction<'_>,
        rule_id: DbId,
        mappings: &[ValueMapping],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM chain_rule_mappings WHERE rule_id = $1")
            .bind(rule_id)
            .execute(&mut **tx)
            .await?;
        Self::insert_mappings(tx, rule_id, mappings).await
    }
}
