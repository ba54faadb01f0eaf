//! HTTP surface tests driven through the router with `oneshot`.

mod common;

use aid_service::models::{Group, Permission};
use common::{TestApp, TEST_PASSWORD};
use service_core::axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &TestApp, mail: &str) -> String {
    let response = app
        .router()
        .oneshot(post_json(
            "/auth/login",
            serde_json::json!({ "mail": mail, "password": TEST_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "Bearer");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "aid-service-test");
    assert_eq!(body["checks"]["sessions"], "up");
}

#[tokio::test]
async fn login_me_logout_flow() {
    let app = TestApp::new();
    app.seed_user(
        "ada@example.org",
        vec![Group::new(None, [Permission::User])],
    );

    let token = login(&app, "ada@example.org").await;

    let response = app
        .router()
        .oneshot(with_bearer("GET", "/users/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["mail"], "ada@example.org");
    assert_eq!(me["groups"][0]["permissions"][0], "user");

    let response = app
        .router()
        .oneshot(with_bearer("POST", "/auth/logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(with_bearer("GET", "/users/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn renew_swaps_the_accepted_token() {
    let app = TestApp::new();
    app.seed_user("ada@example.org", vec![]);
    let old = login(&app, "ada@example.org").await;

    let response = app
        .router()
        .oneshot(with_bearer("POST", "/auth/renew", &old))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new = json_body(response).await["token"].as_str().unwrap().to_string();
    assert_ne!(old, new);

    let response = app
        .router()
        .oneshot(with_bearer("GET", "/users/me", &old))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(with_bearer("GET", "/users/me", &new))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(Request::get("/users/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(with_bearer("GET", "/users/me", "not-a-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_return_401() {
    let app = TestApp::new();
    app.seed_user("ada@example.org", vec![]);

    let response = app
        .router()
        .oneshot(post_json(
            "/auth/login",
            serde_json::json!({ "mail": "ada@example.org", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"mail\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_validates_and_rejects_duplicates() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(post_json(
            "/auth/register",
            serde_json::json!({ "mail": "not-a-mail", "password": "long enough password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["fields"]["mail"][0], "Invalid mail format");
    assert!(body["fields"].get("password").is_none());

    let body = serde_json::json!({ "mail": "new@example.org", "password": "long enough password" });
    let response = app
        .router()
        .oneshot(post_json("/auth/register", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["mail"], "new@example.org");

    let response = app
        .router()
        .oneshot(post_json("/auth/register", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
