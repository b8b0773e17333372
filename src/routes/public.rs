use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Logout lives here because it must succeed even
/// when the presented session has already expired.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates credential + profile and issues the first session cookie.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Issues an additional session cookie.
        .route("/auth/login", post(handlers::login))
        // POST /auth/validate
        // Token check for clients that hold the token outside a cookie. Renews like any
        // authenticated request.
        .route("/auth/validate", post(handlers::validate_token))
        // POST /auth/logout
        // Idempotent session removal; clears the cookie.
        .route("/auth/logout", post(handlers::logout))
}
