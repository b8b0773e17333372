//! Route-level gates: authentication first, then one authorization policy per endpoint.
//!
//! Each function is mounted with `middleware::from_fn_with_state` as a `route_layer`, so
//! path parameters are available and a rejected request never reaches its handler.

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    auth::AuthUser,
    errors::AuthError,
    models::{CommentId, PostId, UserId},
    policy::{Policy, PolicyEngine, ResourceRef},
};

/// require_auth
///
/// Rejects the request unless `AuthUser` resolves. The resolved context is left in the
/// request extensions for the layers and handler below.
pub async fn require_auth(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

async fn authorize(
    engine: &PolicyEngine,
    user: &AuthUser,
    policy: Policy,
    resource: ResourceRef,
) -> Result<(), AuthError> {
    engine.evaluate(user, policy, resource).await.into_result()
}

/// Self-ownership gate for `/profile/{id}/...`.
pub async fn require_self(
    State(engine): State<PolicyEngine>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&engine, &user, Policy::SelfOwnership, ResourceRef::User(user_id)).await?;
    Ok(next.run(request).await)
}

/// Content-ownership gate for `/posts/{post_id}`.
pub async fn require_post_owner(
    State(engine): State<PolicyEngine>,
    user: AuthUser,
    Path(post_id): Path<PostId>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&engine, &user, Policy::ContentOwnership, ResourceRef::Post(post_id)).await?;
    Ok(next.run(request).await)
}

/// Content-ownership gate for `/posts/{post_id}/comments/{comment_id}`.
pub async fn require_comment_owner(
    State(engine): State<PolicyEngine>,
    user: AuthUser,
    Path((post_id, comment_id)): Path<(PostId, CommentId)>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let resource = ResourceRef::Comment { post_id, comment_id };
    authorize(&engine, &user, Policy::ContentOwnership, resource).await?;
    Ok(next.run(request).await)
}

/// Admin-only gate for the `/admin` router.
pub async fn require_admin(
    State(engine): State<PolicyEngine>,
    user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&engine, &user, Policy::AdminOnly, ResourceRef::System).await?;
    Ok(next.run(request).await)
}
