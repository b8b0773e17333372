use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn_with_state,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authentication gate and per-request context.
pub mod auth;
// Credential & session lifecycle.
pub mod auth_service;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
// Authorization decisions.
pub mod policy;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth_service::AuthService;
pub use config::AppConfig;
pub use policy::PolicyEngine;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{InMemorySessionStore, RedisSessionStore, SessionState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::validate_token, handlers::logout,
        handlers::get_me, handlers::change_password, handlers::change_email,
        handlers::delete_post, handlers::delete_comment, handlers::get_user_admin
    ),
    components(
        schemas(
            models::RegisterRequest, models::ProfileFields, models::Gender, models::LoginRequest,
            models::TokenRequest, models::ChangePasswordRequest, models::ChangeEmailRequest,
            models::RegisterResponse, models::LoginResponse, models::ValidateResponse,
            models::UserResponse,
        )
    ),
    tags(
        (name = "socialgram", description = "Socialgram session and authorization API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of injected services shared by every request. The
/// stores are trait objects so tests can substitute in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    /// Relational store: credentials, profiles, ownership facts.
    pub repo: RepositoryState,
    /// Session store: token → identity with expiry.
    pub sessions: SessionState,
    /// Credential & session manager built over the two stores.
    pub auth: AuthService,
    /// Authorization decisions over the relational store.
    pub policy: PolicyEngine,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services from explicitly constructed store handles.
    pub fn new(repo: RepositoryState, sessions: SessionState, config: AppConfig) -> Self {
        let auth = AuthService::new(repo.clone(), sessions.clone(), config.session.clone());
        let policy = PolicyEngine::new(repo.clone());
        Self {
            repo,
            sessions,
            auth,
            policy,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> AuthService {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for PolicyEngine {
    fn from_ref(app_state: &AppState) -> PolicyEngine {
        app_state.policy.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the authentication gate to the authenticated
/// and admin routers, and wraps everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: a single browser origin, with credentials so the AUTH cookie is sent.
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!(
            "CORS_ORIGIN {:?} is not a valid header value: {e}",
            state.config.cors_origin
        ),
    }

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Authentication runs before any per-route policy layer.
        .merge(
            authenticated::authenticated_routes(&state)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .nest("/admin", admin::admin_routes(&state))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, uri and the `x-request-id`, so store errors
/// logged deep in the auth core are correlated with their request.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
