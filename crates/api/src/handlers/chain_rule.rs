//! Handlers for the `/chain-rules` resource.
//!
//! Validation happens here, in a fixed order, before anything is written.
//! The repository then applies each mutation and the read-only flags of the
//! affected target fields in one transaction.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crm_core::chain_rule::evaluator::{evaluate, EvaluationOutcome};
use crm_core::chain_rule::rules::{ComparisonOperator, RuleType};
use crm_core::chain_rule::validation::{
    ensure_distinct_fields, require_create_fields, require_update_fields, validate_rule_values,
};
use crm_core::error::CoreError;
use crm_core::field::Module;
use crm_core::types::DbId;
use crm_db::models::chain_rule::{
    ChainRule, ChainRuleChanges, ChainRuleListParams, ChainRuleWithFields, CreateChainRule,
    NewChainRule, SetChainRuleActive, UpdateChainRule,
};
use crm_db::models::field_definition::FieldDefinition;
use crm_db::repositories::{ChainRuleRepo, FieldDefinitionRepo};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::rbac::{RequireAuth, RequireManager};
use crate::response::{CreatedResponse, DataResponse, MessageResponse};
use crate::state::AppState;

/// Request body for `POST /chain-rules/evaluate`.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub module: String,
    /// Field name to current value.
    #[serde(default)]
    pub record: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/chain-rules?module=
pub async fn list_chain_rules(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<ChainRuleListParams>,
) -> AppResult<Json<DataResponse<Vec<ChainRuleWithFields>>>> {
    let module = params.module.as_deref().map(Module::parse).transpose()?;
    let rules = ChainRuleRepo::list(&state.pool, module.map(Module::as_str)).await?;
    Ok(Json(DataResponse { data: rules }))
}

/// GET /api/v1/chain-rules/{id}
pub async fn get_chain_rule(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ChainRuleWithFields>>> {
    let rule = ChainRuleRepo::find_with_fields(&state.pool, id)
        .await?
        .ok_or_else(|| rule_not_found(id))?;
    Ok(Json(DataResponse { data: rule }))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// POST /api/v1/chain-rules
pub async fn create_chain_rule(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    AppJson(input): AppJson<CreateChainRule>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let (rule_name, module, source_field_id, target_field_id) = require_create_fields(
        input.rule_name.as_deref(),
        input.module.as_deref(),
        input.source_field_id,
        input.target_field_id,
    )?;
    ensure_distinct_fields(source_field_id, target_field_id)?;

    let module = Module::parse(module)?;
    let operator = match non_blank(input.comparison_operator.as_deref()) {
        Some(raw) => ComparisonOperator::parse(raw)?,
        None => ComparisonOperator::default(),
    };
    let rule_type = match non_blank(input.rule_type.as_deref()) {
        Some(raw) => RuleType::parse(raw)?,
        None => RuleType::default(),
    };
    let values = validate_rule_values(
        rule_type,
        operator,
        input.trigger_value.as_deref(),
        input.target_value.as_deref(),
        input.bulk_mappings.as_deref(),
    )?;

    find_module_field(&state, source_field_id, module, "source_field_id").await?;
    let target = find_module_field(&state, target_field_id, module, "target_field_id").await?;

    let rule = ChainRuleRepo::create(
        &state.pool,
        &NewChainRule {
            rule_name: rule_name.to_string(),
            module,
            source_field_id,
            target_field_id,
            operator,
            values,
            created_by: Some(user.user_id),
        },
    )
    .await?;
    state.catalog.invalidate(&state.pool).await;

    tracing::info!(
        rule_id = rule.id,
        rule_type = %rule.rule_type,
        target_field_id,
        user_id = user.user_id,
        "Chain rule created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: rule.id,
            message: format!(
                "Chain rule created. Field '{}' is now read-only.",
                target.field_label
            ),
        }),
    ))
}

/// PUT /api/v1/chain-rules/{id}
///
/// `module`, `source_field_id` and `rule_type` keep their stored values.
/// An omitted `comparison_operator` keeps the stored operator.
pub async fn update_chain_rule(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateChainRule>,
) -> AppResult<Json<MessageResponse>> {
    let current = find_rule(&state, id).await?;

    let (rule_name, target_field_id) =
        require_update_fields(input.rule_name.as_deref(), input.target_field_id)?;
    ensure_distinct_fields(current.source_field_id, target_field_id)?;

    let operator = match non_blank(input.comparison_operator.as_deref()) {
        Some(raw) => ComparisonOperator::parse(raw)?,
        None => ComparisonOperator::parse(&current.comparison_operator)?,
    };
    let values = validate_rule_values(
        RuleType::parse(&current.rule_type)?,
        operator,
        input.trigger_value.as_deref(),
        input.target_value.as_deref(),
        input.bulk_mappings.as_deref(),
    )?;

    let module = Module::parse(&current.module)?;
    let target = find_module_field(&state, target_field_id, module, "target_field_id").await?;

    let outcome = ChainRuleRepo::update(
        &state.pool,
        id,
        &ChainRuleChanges {
            rule_name: rule_name.to_string(),
            target_field_id,
            operator,
            values,
        },
    )
    .await?
    .ok_or_else(|| rule_not_found(id))?;
    state.catalog.invalidate(&state.pool).await;

    tracing::info!(
        rule_id = id,
        target_field_id,
        previous_target_field_id = ?outcome.previous_target_field_id,
        previous_target_released = outcome.previous_target_released,
        user_id = user.user_id,
        "Chain rule updated"
    );

    let message = match outcome.previous_target_field_id {
        Some(_) if outcome.rule.is_active => format!(
            "Chain rule updated. Field '{}' is now read-only.",
            target.field_label
        ),
        _ => "Chain rule updated.".to_string(),
    };
    Ok(Json(MessageResponse::new(message)))
}

/// DELETE /api/v1/chain-rules/{id}
pub async fn delete_chain_rule(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(id): Path<DbId>,
) -> AppResult<Json<MessageResponse>> {
    let outcome = ChainRuleRepo::delete(&state.pool, id)
        .await?
        .ok_or_else(|| rule_not_found(id))?;
    state.catalog.invalidate(&state.pool).await;

    tracing::info!(
        rule_id = id,
        target_field_id = outcome.target_field_id,
        target_released = outcome.target_released,
        user_id = user.user_id,
        "Chain rule deleted"
    );

    let message = if outcome.target_released {
        "Chain rule deleted. Target field is no longer read-only."
    } else {
        "Chain rule deleted."
    };
    Ok(Json(MessageResponse::new(message)))
}

/// PUT /api/v1/chain-rules/{id}/active
pub async fn set_chain_rule_active(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<SetChainRuleActive>,
) -> AppResult<Json<MessageResponse>> {
    let (rule, released) = ChainRuleRepo::set_active(&state.pool, id, input.is_active)
        .await?
        .ok_or_else(|| rule_not_found(id))?;
    state.catalog.invalidate(&state.pool).await;

    tracing::info!(
        rule_id = id,
        is_active = rule.is_active,
        target_field_id = rule.target_field_id,
        target_released = released,
        user_id = user.user_id,
        "Chain rule activation changed"
    );

    let message = match (rule.is_active, released) {
        (true, _) => "Chain rule activated. Target field is now read-only.",
        (false, true) => "Chain rule deactivated. Target field is no longer read-only.",
        (false, false) => "Chain rule deactivated.",
    };
    Ok(Json(MessageResponse::new(message)))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// POST /api/v1/chain-rules/evaluate
///
/// Dry run: applies the module's active rules to `record` and returns the
/// assignments. Nothing is persisted.
pub async fn evaluate_chain_rules(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    AppJson(input): AppJson<EvaluateRequest>,
) -> AppResult<Json<DataResponse<EvaluationOutcome>>> {
    let module = Module::parse(input.module.trim())?;
    let snapshot = state.catalog.current(&state.pool).await?;
    let rules = snapshot.evaluation_rules(module)?;
    Ok(Json(DataResponse {
        data: evaluate(&rules, &input.record),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rule_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "ChainRule",
        id,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn find_rule(state: &AppState, id: DbId) -> AppResult<ChainRule> {
    ChainRuleRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| rule_not_found(id))
}

/// Load a referenced field and check it belongs to `module`.
async fn find_module_field(
    state: &AppState,
    field_id: DbId,
    module: Module,
    key: &str,
) -> AppResult<FieldDefinition> {
    let field = FieldDefinitionRepo::find_by_id(&state.pool, field_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "{key} {field_id} does not exist"
            )))
        })?;
    if field.module != module.as_str() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "{key} {field_id} belongs to module '{}', not '{module}'",
            field.module
        ))));
    }
    Ok(field)
}
