//! Route definitions for the `/chain-rules` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::chain_rule;
use crate::state::AppState;

/// ```text
/// GET    /              -> list_chain_rules
/// POST   /              -> create_chain_rule
/// POST   /evaluate      -> evaluate_chain_rules
/// GET    /{id}          -> get_chain_rule
/// PUT    /{id}          -> update_chain_rule
/// DELETE /{id}          -> delete_chain_rule
/// PUT    /{id}/active   -> set_chain_rule_active
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(chain_rule::list_chain_rules).post(chain_rule::create_chain_rule),
        )
        .route("/evaluate", post(chain_rule::evaluate_chain_rules))
        .route(
            "/{id}",
            get(chain_rule::get_chain_rule)
                .put(chain_rule::update_chain_rule)
                .delete(chain_rule::delete_chain_rule),
        )
        .route("/{id}/active", put(chain_rule::set_chain_rule_active))
}
