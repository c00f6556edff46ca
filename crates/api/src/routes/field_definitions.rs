//! Route definitions for the `/field-definitions` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::field_definition;
use crate::state::AppState;

/// ```text
/// GET    /       -> list_field_definitions
/// POST   /       -> create_field_definition
/// GET    /{id}   -> get_field_definition
/// PUT    /{id}   -> update_field_definition
/// DELETE /{id}   -> delete_field_definition
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(field_definition::list_field_definitions)
                .post(field_definition::create_field_definition),
        )
        .route(
            "/{id}",
            get(field_definition::get_field_definition)
                .put(field_definition::update_field_definition)
                .delete(field_definition::delete_field_definition),
        )
}
