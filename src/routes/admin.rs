use crate::{AppState, handlers, middleware as gates};
use axum::{Router, middleware, routing::get};

/// Admin Router Module
///
/// Nested under `/admin`. The whole router is wrapped in the admin-only policy, so no
/// handler here needs its own role check.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // GET /admin/users/{id}
        // Any account by id.
        .route("/users/{id}", get(handlers::get_user_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gates::require_admin,
        ))
}
