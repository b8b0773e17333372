use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use socialgram::{
    AppConfig, AppState, create_router,
    models::UserId,
    repository::InMemoryRepository,
    session::InMemorySessionStore,
};
use std::sync::Arc;
use tower::ServiceExt;

// --- Test Harness ---

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
}

fn spawn_app() -> TestApp {
    spawn_app_with_sessions(InMemorySessionStore::new())
}

fn spawn_app_with_sessions(sessions: InMemorySessionStore) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone(), Arc::new(sessions), AppConfig::default());
    TestApp {
        router: create_router(state),
        repo,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Registers `username` and returns its id plus the `AUTH=...` cookie pair.
    async fn register(&self, username: &str) -> (UserId, String) {
        let response = self
            .send(Method::POST, "/auth/register", None, Some(register_body(username)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = auth_cookie(&response);
        let body = json_body(response).await;
        (body["id"].as_i64().unwrap(), cookie)
    }
}

fn register_body(username: &str) -> Value {
    json!({
        "username": username,
        "password": "hunter22",
        "email": format!("{username}@example.com"),
        "name": "Test",
        "surname": "User",
        "gender": "other",
        "birth_date": "1995-06-15"
    })
}

/// The `AUTH=<token>` pair from `Set-Cookie`, ready to send back in `Cookie`.
fn auth_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set a cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();
    let response = app.send(Method::GET, "/health", None, None).await;
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_sets_http_only_cookie() {
    let app = spawn_app();

    let response = app
        .send(Method::POST, "/auth/register", None, Some(register_body("alice")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("AUTH="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));

    let body = json_body(response).await;
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let app = spawn_app();
    app.register("alice").await;

    let response = app
        .send(Method::POST, "/auth/register", None, Some(register_body("alice")))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "username or email already exists");
}

#[tokio::test]
async fn test_register_with_taken_email_is_conflict() {
    let app = spawn_app();
    app.register("alice").await;
    let mut body = register_body("bob");
    body["email"] = json!("alice@example.com");

    let response = app.send(Method::POST, "/auth/register", None, Some(body)).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_accepts_timestamp_birth_date() {
    let app = spawn_app();
    let mut body = register_body("alice");
    body["birth_date"] = json!("1995-06-15T00:00:00Z");

    let response = app.send(Method::POST, "/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_invalid_fields() {
    let app = spawn_app();
    let mut body = register_body("alice");
    body["email"] = json!("not-an-email");

    let response = app.send(Method::POST, "/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = register_body("bob");
    body["name"] = json!("a".repeat(21));
    let response = app.send(Method::POST, "/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_wrong_password() {
    let app = spawn_app();
    app.register("alice").await;

    let ok = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"username": "alice", "password": "hunter22"})),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert!(auth_cookie(&ok).starts_with("AUTH="));

    let bad = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"username": "alice", "password": "wrong"})),
        )
        .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    assert!(bad.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_validate_endpoint() {
    let app = spawn_app();
    let (id, cookie) = app.register("alice").await;
    let token = cookie.trim_start_matches("AUTH=");

    let ok = app
        .send(Method::POST, "/auth/validate", None, Some(json!({ "token": token })))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(json_body(ok).await["id"], id);

    let bad = app
        .send(Method::POST, "/auth/validate", None, Some(json!({ "token": "bogus" })))
        .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_cookie() {
    let app = spawn_app();
    let (_, cookie) = app.register("alice").await;

    let response = app.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let me = app.send(Method::GET, "/me", Some(&cookie), None).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    // Logging out an already-removed session still succeeds.
    let again = app.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(again.status(), StatusCode::OK);

    let anonymous = app.send(Method::POST, "/auth/logout", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

// --- Authenticated Routes ---

#[tokio::test]
async fn test_me_requires_session() {
    let app = spawn_app();
    let (id, cookie) = app.register("alice").await;

    let anonymous = app.send(Method::GET, "/me", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(anonymous).await["error"], "authentication required");

    let me = app.send(Method::GET, "/me", Some(&cookie), None).await;
    assert_eq!(me.status(), StatusCode::OK);
    let body = json_body(me).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "alice");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let app = spawn_app();
    let (id, cookie) = app.register("alice").await;
    let token = cookie.trim_start_matches("AUTH=");

    let request = Request::builder()
        .uri("/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["id"], id);
}

#[tokio::test]
async fn test_session_store_outage_is_internal_error() {
    let app = spawn_app_with_sessions(InMemorySessionStore::new_failing());

    let response = app.send(Method::GET, "/me", Some("AUTH=whatever"), None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "internal server error");
}

#[tokio::test]
async fn test_change_password_is_self_only() {
    let app = spawn_app();
    let (alice, alice_cookie) = app.register("alice").await;
    let (_, bob_cookie) = app.register("bob").await;
    let body = json!({"old_password": "hunter22", "new_password": "correct-horse"});

    let uri = format!("/profile/{alice}/password");
    let forbidden = app
        .send(Method::PATCH, &uri, Some(&bob_cookie), Some(body.clone()))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let ok = app.send(Method::PATCH, &uri, Some(&alice_cookie), Some(body)).await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    let wrong_old = app
        .send(
            Method::PATCH,
            &uri,
            Some(&alice_cookie),
            Some(json!({"old_password": "hunter22", "new_password": "x"})),
        )
        .await;
    assert_eq!(wrong_old.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_email_validates_input() {
    let app = spawn_app();
    let (alice, cookie) = app.register("alice").await;
    let uri = format!("/profile/{alice}/email");

    let bad = app
        .send(
            Method::PATCH,
            &uri,
            Some(&cookie),
            Some(json!({"password": "hunter22", "new_email": "nope"})),
        )
        .await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let ok = app
        .send(
            Method::PATCH,
            &uri,
            Some(&cookie),
            Some(json!({"password": "hunter22", "new_email": "alice@new.example.com"})),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    app.register("bob").await;
    let taken = app
        .send(
            Method::PATCH,
            &uri,
            Some(&cookie),
            Some(json!({"password": "hunter22", "new_email": "bob@example.com"})),
        )
        .await;
    assert_eq!(taken.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_post_ownership() {
    let app = spawn_app();
    let (alice, alice_cookie) = app.register("alice").await;
    let (_, bob_cookie) = app.register("bob").await;
    let post = app.repo.insert_post(alice);
    let uri = format!("/posts/{post}");

    let anonymous = app.send(Method::DELETE, &uri, None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forbidden = app.send(Method::DELETE, &uri, Some(&bob_cookie), None).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let ok = app.send(Method::DELETE, &uri, Some(&alice_cookie), None).await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    let gone = app.send(Method::DELETE, &uri, Some(&alice_cookie), None).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_can_delete_any_comment() {
    let app = spawn_app();
    let (alice, alice_cookie) = app.register("alice").await;
    let (admin, admin_cookie) = app.register("root").await;
    app.repo.set_admin(admin, true);

    let post = app.repo.insert_post(alice);
    let mine = app.repo.insert_comment(post, alice);
    let other = app.repo.insert_comment(post, admin);

    let ok = app
        .send(Method::DELETE, &format!("/posts/{post}/comments/{mine}"), Some(&admin_cookie), None)
        .await;
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    let forbidden = app
        .send(Method::DELETE, &format!("/posts/{post}/comments/{other}"), Some(&alice_cookie), None)
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}

// --- Admin Routes ---

#[tokio::test]
async fn test_admin_routes_require_role() {
    let app = spawn_app();
    let (alice, alice_cookie) = app.register("alice").await;
    let (admin, admin_cookie) = app.register("root").await;
    app.repo.set_admin(admin, true);

    let anonymous = app.send(Method::GET, &format!("/admin/users/{alice}"), None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forbidden = app
        .send(Method::GET, &format!("/admin/users/{alice}"), Some(&alice_cookie), None)
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let ok = app
        .send(Method::GET, &format!("/admin/users/{alice}"), Some(&admin_cookie), None)
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(json_body(ok).await["username"], "alice");

    let missing = app
        .send(Method::GET, "/admin/users/9999", Some(&admin_cookie), None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
