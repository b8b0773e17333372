use crate::{
    AppState,
    auth::{AuthUser, clear_session_cookie, extract_token, session_cookie},
    errors::{AuthError, StoreError},
    models::{
        ChangeEmailRequest, ChangePasswordRequest, CommentId, LoginRequest, LoginResponse,
        PostId, RegisterRequest, RegisterResponse, TokenRequest, UserId, UserResponse,
        ValidateResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates the account and its profile, opens a session and sets the
/// `AUTH` cookie.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;

    let (id, token) = state
        .auth
        .register(&payload.username, &payload.password, &payload.email, payload.profile)
        .await?;

    let cookie = session_cookie(&token, state.auth.session_config());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(RegisterResponse {
            id,
            username: payload.username,
        }),
    ))
}

/// login
///
/// [Public Route] Verifies credentials and opens a new session. Existing sessions for the
/// same user stay valid.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.validate()?;

    let token = state.auth.login(&payload.username, &payload.password).await?;

    let cookie = session_cookie(&token, state.auth.session_config());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            username: payload.username,
        }),
    ))
}

/// validate_token
///
/// [Public Route] Checks a token presented in the body. A successful check renews the
/// session exactly as an authenticated request would.
#[utoipa::path(
    post,
    path = "/auth/validate",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Valid", body = ValidateResponse),
        (status = 401, description = "Invalid or expired")
    )
)]
pub async fn validate_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<ValidateResponse>, AuthError> {
    let id = state.auth.validate_token(&payload.token).await?;
    Ok(Json(ValidateResponse { id }))
}

/// logout
///
/// [Public Route] Removes the presented session and clears the cookie. Requires a token to
/// be presented; removing one that is already gone succeeds.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No session presented")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_token(&headers).ok_or(AuthError::Unauthenticated)?;
    state.auth.logout(&token).await?;

    let cookie = clear_session_cookie(state.auth.session_config());
    Ok(([(header::SET_COOKIE, cookie)], Json(serde_json::json!({}))))
}

// --- Account Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AuthError> {
    match state.repo.get_credential(id).await {
        Ok(credential) => Ok(Json(credential.into())),
        // Session outlived its account.
        Err(StoreError::NoRows) => Err(AuthError::Unauthenticated),
        Err(e) => Err(e.into()),
    }
}

/// change_password
///
/// [Authenticated Route, self-ownership] The path id is the account being changed. An
/// admin passes the ownership gate but must still know that account's current password.
#[utoipa::path(
    patch,
    path = "/profile/{id}/password",
    params(("id" = i64, Path, description = "User ID")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Changed"),
        (status = 401, description = "Wrong current password"),
        (status = 403, description = "Not your account")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AuthError> {
    payload.validate()?;
    state
        .auth
        .change_password(user_id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// change_email
///
/// [Authenticated Route, self-ownership]
#[utoipa::path(
    patch,
    path = "/profile/{id}/email",
    params(("id" = i64, Path, description = "User ID")),
    request_body = ChangeEmailRequest,
    responses(
        (status = 204, description = "Changed"),
        (status = 401, description = "Wrong password"),
        (status = 403, description = "Not your account"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn change_email(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<ChangeEmailRequest>,
) -> Result<StatusCode, AuthError> {
    payload.validate()?;
    state
        .auth
        .change_email(user_id, &payload.password, &payload.new_email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Content Handlers ---

/// delete_post
///
/// [Authenticated Route, content-ownership] Owner or admin only; the gate has already
/// resolved existence and ownership.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
) -> Result<StatusCode, AuthError> {
    // A concurrent delete can win between the gate and here.
    if state.repo.delete_post(post_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::NotFound)
    }
}

/// delete_comment
///
/// [Authenticated Route, content-ownership]
#[utoipa::path(
    delete,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(PostId, CommentId)>,
) -> Result<StatusCode, AuthError> {
    if state.repo.delete_comment(post_id, comment_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::NotFound)
    }
}

// --- Admin Handlers ---

/// get_user_admin
///
/// [Admin Route] Any account by id.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Not admin"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user_admin(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserResponse>, AuthError> {
    match state.repo.get_credential(user_id).await {
        Ok(credential) => Ok(Json(credential.into())),
        Err(StoreError::NoRows) => Err(AuthError::NotFound),
        Err(e) => Err(e.into()),
    }
}
