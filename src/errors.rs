use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// StoreError
///
/// The only error type that crosses the store seam (relational store and session store).
/// Raw `sqlx` / `redis` errors are folded into it so that nothing above the repository
/// layer has to know which backend produced a failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The point lookup matched no row. Distinct from every other failure so callers
    /// can tell "does not exist" apart from "could not ask".
    #[error("no rows returned")]
    NoRows,

    /// The store rejected an insert on a unique constraint.
    #[error("unique constraint violated: {constraint:?}")]
    UniqueViolation { constraint: Option<String> },

    /// Connection failure, timeout, protocol error.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NoRows,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_string),
                }
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// AuthError
///
/// The error taxonomy of the authentication and authorization core. Every variant maps
/// to exactly one HTTP status; internal detail is logged and never returned to the client.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("username or email already exists")]
    DuplicateIdentity,

    /// Unknown username and wrong password share this error.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("resource not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("transient store error: {0}")]
    TransientStore(String),

    #[error("{message}")]
    BadRequest { message: String },

    /// Failures that are neither the caller's fault nor the store's (hashing, task join).
    #[error("failed to {operation}")]
    Internal { operation: String },
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateIdentity => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredToken
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AuthError::TransientStore(_) | AuthError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a message that is safe to show to the caller.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::DuplicateIdentity => "username or email already exists".to_string(),
            AuthError::InvalidCredentials => "invalid credentials".to_string(),
            AuthError::InvalidOrExpiredToken | AuthError::Unauthenticated => {
                "authentication required".to_string()
            }
            AuthError::NotFound => "not found".to_string(),
            AuthError::Forbidden => "forbidden".to_string(),
            AuthError::BadRequest { message } => message.clone(),
            AuthError::TransientStore(_) | AuthError::Internal { .. } => {
                "internal server error".to_string()
            }
        }
    }
}

impl From<StoreError> for AuthError {
    /// Store failures become `TransientStore` after being logged. A unique violation can
    /// only come from the credential insert, so it surfaces as `DuplicateIdentity`.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => {
                tracing::debug!(?constraint, "unique violation mapped to duplicate identity");
                AuthError::DuplicateIdentity
            }
            other => {
                tracing::error!(error = %other, "store operation failed");
                AuthError::TransientStore(other.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::TransientStore(_) | AuthError::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            AuthError::Forbidden | AuthError::Unauthenticated | AuthError::InvalidOrExpiredToken => {
                tracing::info!("Authorization error: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
