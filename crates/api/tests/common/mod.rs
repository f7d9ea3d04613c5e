//! Shared helpers for HTTP-level integration tests.
//!
//! Requests are sent straight into the router with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use calctree_api::auth::jwt::JwtConfig;
use calctree_api::auth::password::hash_password;
use calctree_api::config::ServerConfig;
use calctree_api::router::build_app_router;
use calctree_api::state::AppState;
use calctree_core::roles::ROLE_ADMIN;
use calctree_db::models::user::CreateUser;
use calctree_db::repositories::UserRepo;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_ORIGIN: &str = "http://localhost:3001";
pub const TEST_PASSWORD: &str = "secret123";

/// Build a test `ServerConfig` with the development CORS origin.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        db_max_connections: 5,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            expiry_hours: 1,
        },
    }
}

/// Build the full application router over `pool`, middleware included.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(AppState::new(pool, test_config()))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A registered user as seen by the tests.
pub struct TestUser {
    pub id: String,
    pub token: String,
}

/// Register `username` through the API.
pub async fn register(app: &Router, username: &str) -> TestUser {
    let response = post_json(
        app.clone(),
        "/api/v1/auth/register",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    TestUser {
        id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: json["data"]["token"].as_str().unwrap().to_string(),
    }
}

/// Insert an admin directly and log them in through the API.
pub async fn create_admin(pool: &PgPool, app: &Router, username: &str) -> TestUser {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            password_hash: hash_password(TEST_PASSWORD).unwrap(),
            avatar_url: None,
            role: ROLE_ADMIN.to_string(),
        },
    )
    .await
    .unwrap();

    let response = post_json(
        app.clone(),
        "/api/v1/auth/login",
        json!({ "username": username, "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    TestUser {
        id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: json["data"]["token"].as_str().unwrap().to_string(),
    }
}
