use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::{
    auth_service::AuthService,
    config::{AUTH_COOKIE_NAME, SessionConfig},
    errors::AuthError,
    models::UserId,
};

/// AuthUser
///
/// The per-request authorization context: the identity resolved from the session token,
/// plus a slot for the admin role so it is looked up at most once per request no matter
/// how many policies run. Lives in the request extensions and is dropped with the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    admin: Arc<OnceCell<bool>>,
}

impl AuthUser {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            admin: Arc::new(OnceCell::new()),
        }
    }

    /// The cached admin flag, resolving it with `lookup` on first use.
    pub(crate) async fn admin_or_init<F, Fut>(&self, lookup: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        *self.admin.get_or_init(lookup).await
    }
}

/// Pull the session token out of the `AUTH` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// `Set-Cookie` value binding the session token. `Max-Age` is left off so the browser keeps
/// the cookie for the session; the server-side TTL governs validity.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("{AUTH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax{secure}")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("{AUTH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}")
}

/// AuthUser Extractor Implementation
///
/// Resolves the bearer token through `AuthService::validate_token` (which also applies
/// sliding renewal) and caches the result in the request extensions, so the gate
/// middleware, policy middleware and handler share one resolution.
///
/// Rejection: `Unauthenticated` when no token is presented, `InvalidOrExpiredToken` when
/// the session is unknown, `TransientStore` when the session store is unreachable.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let auth = AuthService::from_ref(state);
        let user_id = auth.validate_token(&token).await?;

        let user = AuthUser::new(user_id);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
