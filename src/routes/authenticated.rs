use crate::{AppState, handlers, middleware as gates};
use axum::{
    Router,
    middleware,
    routing::{delete, get, patch},
};

/// Authenticated Router Module
///
/// Every route here sits behind `require_auth` (applied by `create_router`). Routes that
/// act on a specific resource additionally carry their authorization policy as a
/// `route_layer`, which runs after authentication and before the handler.
pub fn authenticated_routes(state: &AppState) -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Self-ownership ---
        // PATCH /profile/{id}/password, PATCH /profile/{id}/email
        .route(
            "/profile/{id}/password",
            patch(handlers::change_password).route_layer(middleware::from_fn_with_state(
                state.clone(),
                gates::require_self,
            )),
        )
        .route(
            "/profile/{id}/email",
            patch(handlers::change_email).route_layer(middleware::from_fn_with_state(
                state.clone(),
                gates::require_self,
            )),
        )
        // --- Content-ownership ---
        // DELETE /posts/{post_id}
        .route(
            "/posts/{post_id}",
            delete(handlers::delete_post).route_layer(middleware::from_fn_with_state(
                state.clone(),
                gates::require_post_owner,
            )),
        )
        // DELETE /posts/{post_id}/comments/{comment_id}
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            delete(handlers::delete_comment).route_layer(middleware::from_fn_with_state(
                state.clone(),
                gates::require_comment_owner,
            )),
        )
}
