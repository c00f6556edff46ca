//! Handlers for the `/field-definitions` resource.
//!
//! Reads are open to any authenticated user; mutations need `manager`.
//! `is_read_only` is never taken from a payload; chain rules own it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crm_core::error::CoreError;
use crm_core::field::{field_name_from_label, validate_options, FieldType, Module};
use crm_core::patch::Patch;
use crm_core::types::DbId;
use crm_db::models::field_definition::{
    CreateFieldDefinition, FieldDefinition, FieldDefinitionChanges, FieldDefinitionListParams,
    NewFieldDefinition, UpdateFieldDefinition,
};
use crm_db::repositories::{ChainRuleRepo, FieldDefinitionRepo};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::rbac::{RequireAuth, RequireManager};
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// GET /api/v1/field-definitions?module=
pub async fn list_field_definitions(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<FieldDefinitionListParams>,
) -> AppResult<Json<DataResponse<Vec<FieldDefinition>>>> {
    let module = params.module.as_deref().map(Module::parse).transpose()?;
    let fields = FieldDefinitionRepo::list(&state.pool, module.map(Module::as_str)).await?;
    Ok(Json(DataResponse { data: fields }))
}

/// GET /api/v1/field-definitions/{id}
pub async fn get_field_definition(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<FieldDefinition>>> {
    let field = find_field(&state, id).await?;
    Ok(Json(DataResponse { data: field }))
}

/// POST /api/v1/field-definitions
pub async fn create_field_definition(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    AppJson(input): AppJson<CreateFieldDefinition>,
) -> AppResult<(StatusCode, Json<DataResponse<FieldDefinition>>)> {
    let new_field = validate_create(input)?;
    let field = FieldDefinitionRepo::create(&state.pool, &new_field).await?;
    state.catalog.invalidate(&state.pool).await;

    tracing::info!(
        field_id = field.id,
        module = %field.module,
        field_name = %field.field_name,
        user_id = user.user_id,
        "Field definition created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: field })))
}

/// PUT /api/v1/field-definitions/{id}
///
/// Partial update: keys left out of the body keep their stored value.
pub async fn update_field_definition(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateFieldDefinition>,
) -> AppResult<Json<DataResponse<FieldDefinition>>> {
    let current = find_field(&state, id).await?;
    let changes = resolve_changes(&current, input)?;

    let field = FieldDefinitionRepo::update(&state.pool, id, &changes)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "FieldDefinition",
            id,
        }))?;
    if !changes.is_empty() {
        state.catalog.invalidate(&state.pool).await;
        tracing::info!(field_id = id, user_id = user.user_id, "Field definition updated");
    }

    Ok(Json(DataResponse { data: field }))
}

/// DELETE /api/v1/field-definitions/{id}
///
/// Refused with 409 while any chain rule uses the field.
pub async fn delete_field_definition(
    State(state): State<AppState>,
    RequireManager(user): RequireManager,
    Path(id): Path<DbId>,
) -> AppResult<Json<MessageResponse>> {
    let field = find_field(&state, id).await?;

    let references = ChainRuleRepo::count_referencing_field(&state.pool, id).await?;
    if references > 0 {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Field '{}' is used by {references} chain rule(s); delete those rules first",
            field.field_label
        ))));
    }

    if !FieldDefinitionRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "FieldDefinition",
            id,
        }));
    }
    state.catalog.invalidate(&state.pool).await;
    tracing::info!(field_id = id, user_id = user.user_id, "Field definition deleted");

    Ok(Json(MessageResponse::new(format!(
        "Field '{}' deleted",
        field.field_label
    ))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_field(state: &AppState, id: DbId) -> AppResult<FieldDefinition> {
    FieldDefinitionRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "FieldDefinition",
            id,
        }))
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str, CoreError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::Validation(format!("{key} is required"))),
    }
}

/// Blank placeholders are stored as `NULL`.
fn normalize_placeholder(placeholder: Option<String>) -> Option<String> {
    placeholder
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

fn validate_create(input: CreateFieldDefinition) -> Result<NewFieldDefinition, CoreError> {
    let module = Module::parse(required(input.module.as_deref(), "module")?)?;
    let field_label = required(input.field_label.as_deref(), "field_label")?.to_string();
    let field_type = FieldType::parse(required(input.field_type.as_deref(), "field_type")?)?;

    Ok(NewFieldDefinition {
        module,
        field_name: field_name_from_label(&field_label)?,
        field_label,
        field_type,
        placeholder: normalize_placeholder(input.placeholder),
        is_required: input.is_required.unwrap_or(false),
        options: validate_options(field_type, input.options.as_deref())?,
        sort_order: input.sort_order.unwrap_or(0),
    })
}

fn not_nullable(key: &str) -> CoreError {
    CoreError::Validation(format!("{key} cannot be null"))
}

/// Turn a patch payload into column changes against the stored row.
///
/// A label change re-derives `field_name`. A change to either `field_type`
/// or `options` re-checks the resulting pair.
fn resolve_changes(
    current: &FieldDefinition,
    input: UpdateFieldDefinition,
) -> Result<FieldDefinitionChanges, CoreError> {
    let mut changes = FieldDefinitionChanges::default();

    match input.field_label {
        Patch::Absent => {}
        Patch::Null => return Err(not_nullable("field_label")),
        Patch::Value(label) => {
            let label = required(Some(label.as_str()), "field_label")?.to_string();
            changes.field_name = Some(field_name_from_label(&label)?);
            changes.field_label = Some(label);
        }
    }

    match input.field_type {
        Patch::Absent => {}
        Patch::Null => return Err(not_nullable("field_type")),
        Patch::Value(raw) => changes.field_type = Some(FieldType::parse(raw.trim())?),
    }

    match input.is_required {
        Patch::Absent => {}
        Patch::Null => return Err(not_nullable("is_required")),
        Patch::Value(v) => changes.is_required = Some(v),
    }

    match input.sort_order {
        Patch::Absent => {}
        Patch::Null => return Err(not_nullable("sort_order")),
        Patch::Value(v) => changes.sort_order = Some(v),
    }

    changes.placeholder = input
        .placeholder
        .into_change()
        .map(normalize_placeholder);

    if changes.field_type.is_some() || !input.options.is_absent() {
        let field_type = match changes.field_type {
            Some(t) => t,
            None => FieldType::parse(&current.field_type)?,
        };
        let options = input.options.apply(current.options.clone());
        changes.options = Some(validate_options(field_type, options.as_deref())?);
    }

    Ok(changes)
}
