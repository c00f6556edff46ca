pub mod admin;
pub mod auth;
pub mod chain_rules;
pub mod field_definitions;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                      login (public)
/// /auth/refresh                    refresh (public)
/// /auth/logout                     logout (auth)
///
/// /admin/users                     list, create (admin)
/// /admin/users/{id}                deactivate (admin)
///
/// /field-definitions               list (auth), create (manager)
/// /field-definitions/{id}          get (auth), update, delete (manager)
///
/// /chain-rules                     list (auth), create (manager)
/// /chain-rules/evaluate            dry-run evaluation (auth)
/// /chain-rules/{id}                get (auth), update, delete (manager)
/// /chain-rules/{id}/active         activate / deactivate (manager)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
        .nest("/field-definitions", field_definitions::router())
        .nest("/chain-rules", chain_rules::router())
}
