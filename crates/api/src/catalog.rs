//! Process-wide snapshot of field definitions and active chain rules.
//!
//! Readers clone an `Arc` to an immutable [`CatalogSnapshot`]; a refresh
//! builds a complete new snapshot and swaps it in. Nothing mutates a
//! snapshot after it has been published.
//!
//! Interval refreshes and post-mutation reloads can overlap. Each load takes
//! a generation number before it reads, and a load only publishes if no
//! later-started load has published already.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use crm_core::chain_rule::evaluator::EvaluationRule;
use crm_core::chain_rule::rules::{ComparisonOperator, RuleType, RuleValues, ValueMapping};
use crm_core::error::CoreError;
use crm_core::field::Module;
use crm_core::types::Timestamp;
use crm_db::models::chain_rule::ChainRuleWithFields;
use crm_db::models::field_definition::FieldDefinition;
use crm_db::repositories::{ChainRuleRepo, FieldDefinitionRepo};
use sqlx::PgPool;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    /// Order in which loads started; 0 for the empty initial snapshot.
    pub generation: u64,
    pub fields: Vec<FieldDefinition>,
    /// Active rules of every module, ordered by module then id.
    pub active_rules: Vec<ChainRuleWithFields>,
    /// `None` until the first load.
    pub loaded_at: Option<Timestamp>,
}

impl CatalogSnapshot {
    /// Active rules of `module` in evaluation order.
    pub fn evaluation_rules(&self, module: Module) -> Result<Vec<EvaluationRule>, CoreError> {
        self.active_rules
            .iter()
            .filter(|r| r.module == module.as_str())
            .map(to_evaluation_rule)
            .collect()
    }
}

/// Convert a stored rule into the evaluator's representation.
pub fn to_evaluation_rule(rule: &ChainRuleWithFields) -> Result<EvaluationRule, CoreError> {
    let operator = ComparisonOperator::parse(&rule.comparison_operator)?;
    let values = match RuleType::parse(&rule.rule_type)? {
        RuleType::Simple => RuleValues::Simple {
            trigger_value: rule.trigger_value.clone(),
            target_value: rule.target_value.clone().unwrap_or_default(),
        },
        RuleType::BulkMapping => RuleValues::Bulk(
            rule.mappings
                .iter()
                .flatten()
                .map(|m| ValueMapping {
                    trigger_value: m.trigger_value.clone(),
                    target_value: m.target_value.clone(),
                })
                .collect(),
        ),
    };
    Ok(EvaluationRule {
        id: rule.id,
        source_field: rule.source_field_name.clone(),
        target_field: rule.target_field_name.clone(),
        operator,
        values,
    })
}

/// Holder of the current snapshot.
#[derive(Debug, Default)]
pub struct FieldCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
    generations: AtomicU64,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// The current snapshot, loading it first if it was never loaded.
    pub async fn current(&self, pool: &PgPool) -> Result<Arc<CatalogSnapshot>, sqlx::Error> {
        let snapshot = self.snapshot().await;
        if snapshot.loaded_at.is_some() {
            return Ok(snapshot);
        }
        self.refresh(pool).await
    }

    /// Load a fresh snapshot from the database and publish it. Returns the
    /// snapshot that is current afterwards, which is a newer one when this
    /// load lost a race.
    pub async fn refresh(&self, pool: &PgPool) -> Result<Arc<CatalogSnapshot>, sqlx::Error> {
        let snapshot = self.load(pool).await?;
        Ok(self.publish(snapshot).await)
    }

    /// Reload after a committed mutation. A failure keeps the previous
    /// snapshot; the next interval refresh catches up.
    pub async fn invalidate(&self, pool: &PgPool) {
        if let Err(e) = self.refresh(pool).await {
            tracing::warn!(error = %e, "Field catalog reload failed");
        }
    }

    async fn load(&self, pool: &PgPool) -> Result<CatalogSnapshot, sqlx::Error> {
        // Taken before reading so the number orders what each load can see.
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        let fields = FieldDefinitionRepo::list(pool, None).await?;
        let mut active_rules = Vec::new();
        for module in Module::ALL {
            active_rules.extend(ChainRuleRepo::list_active(pool, module.as_str()).await?);
        }

        Ok(CatalogSnapshot {
            generation,
            fields,
            active_rules,
            loaded_at: Some(Utc::now()),
        })
    }

    async fn publish(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let mut current = self.current.write().await;
        if snapshot.generation < current.generation {
            tracing::debug!(
                stale = snapshot.generation,
                current = current.generation,
                "Discarded stale field catalog load"
            );
            return Arc::clone(&*current);
        }

        *current = Arc::new(snapshot);
        tracing::debug!(
            generation = current.generation,
            fields = current.fields.len(),
            active_rules = current.active_rules.len(),
            "Field catalog refreshed"
        );
        Arc::clone(&*current)
    }
}
