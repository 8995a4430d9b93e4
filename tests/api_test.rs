//! End-to-end tests of the HTTP API against a temporary SQLite database.
//!
//! Requests go through the full router (extractors, auth, error mapping)
//! with `tower::ServiceExt::oneshot`; no socket is opened.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use futures_util::future::join_all;
use quote_api::auth::{TOKEN_TTL_SECS, TokenService};
use quote_api::config::{Config, DatabaseConfig, PoolOptions, SqliteConfig};
use quote_api::db::ConnectionManager;
use quote_api::models::PublicUser;
use quote_api::{AppState, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(ConnectionManager::new(DatabaseConfig::Sqlite(SqliteConfig {
        path: dir.path().join("api.db"),
        pool_options: PoolOptions::default(),
    })));
    manager.initialize().await.unwrap();

    let config = Config {
        jwt_secret: SECRET.to_string(),
        bcrypt_cost: 4,
        ..Config::default()
    };
    let state = AppState::new(manager, &config);
    TestApp {
        router: create_router(state, None),
        _dir: dir,
    }
}

impl TestApp {
    async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send_raw(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send_raw(Method::POST, uri, token, Some(body.to_string()))
            .await
    }

    /// Register Alice and return her token.
    async fn register_alice(&self) -> String {
        let (status, body) = self
            .post(
                "/api/register",
                None,
                json!({ "name": "Alice", "email": "a@x.com", "password": "secret1" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_register_then_fetch_current_user() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({ "name": "Alice", "email": "a@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Account created successfully");
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"]["id"].as_i64().unwrap() > 0);
    assert!(body["user"].get("password").is_none());

    let token = body["token"].as_str().unwrap();
    let (status, body) = app.get("/api/user", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"]["created_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_register_validation() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/register", None, json!({ "name": "Bob", "email": "b@x.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields are required");

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({ "name": "Bob", "email": "b@x.com", "password": "12345" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");

    let (status, body) = app
        .send_raw(
            Method::POST,
            "/api/register",
            None,
            Some("{not json".to_string()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let app = setup().await;
    app.register_alice().await;

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({ "name": "Other", "email": "a@x.com", "password": "another1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn test_concurrent_duplicate_registration_creates_one_account() {
    let app = setup().await;

    let attempts = (0..5).map(|i| {
        app.post(
            "/api/register",
            None,
            json!({ "name": format!("Racer {i}"), "email": "race@x.com", "password": "secret1" }),
        )
    });
    let results = join_all(attempts).await;

    let created = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    assert!(
        results
            .iter()
            .all(|(status, _)| *status == StatusCode::CREATED || *status == StatusCode::CONFLICT)
    );

    let (_, body) = app.get("/api/users", None).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_login() {
    let app = setup().await;
    app.register_alice().await;

    let (status, body) = app
        .post(
            "/api/login",
            None,
            json!({ "email": "a@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["email"], "a@x.com");
    let token = body["token"].as_str().unwrap();

    let (status, _) = app.get("/api/user", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = setup().await;
    app.register_alice().await;

    let wrong_password = app
        .post(
            "/api/login",
            None,
            json!({ "email": "a@x.com", "password": "wrong-password" }),
        )
        .await;
    let unknown_email = app
        .post(
            "/api/login",
            None,
            json!({ "email": "nobody@x.com", "password": "secret1" }),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password.1["error"], "Invalid email or password");

    let (status, body) = app.post("/api/login", None, json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password required");
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let app = setup().await;

    for uri in ["/api/user", "/api/quotes", "/api/quotes/1"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Access token required");

        let (status, body) = app.get(uri, Some("garbage.token.value")).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"], "Invalid or expired token");
    }

    let (status, _) = app
        .post("/api/quote", None, json!({ "company": "Acme", "tagName": "T1" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_rejected() {
    let app = setup().await;
    app.register_alice().await;

    let user = PublicUser {
        id: 1,
        name: "Alice".into(),
        email: "a@x.com".into(),
    };
    let eight_days_ago = chrono::Utc::now().timestamp() - 8 * 24 * 60 * 60;
    let expired = TokenService::new(SECRET)
        .issue_at(&user, eight_days_ago)
        .unwrap();
    let (status, _) = app.get("/api/user", Some(&expired)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let foreign = TokenService::new("some-other-secret").issue(&user).unwrap();
    let (status, _) = app.get("/api/user", Some(&foreign)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_accepted_until_seven_days() {
    let app = setup().await;
    app.register_alice().await;

    let user = PublicUser {
        id: 1,
        name: "Alice".into(),
        email: "a@x.com".into(),
    };
    let service = TokenService::new(SECRET);
    let now = chrono::Utc::now().timestamp();

    let almost_expired = service.issue_at(&user, now - TOKEN_TTL_SECS + 60).unwrap();
    let (status, body) = app.get("/api/user", Some(&almost_expired)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");

    let just_expired = service.issue_at(&user, now - TOKEN_TTL_SECS - 1).unwrap();
    let (status, _) = app.get("/api/user", Some(&just_expired)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_for_missing_user_returns_not_found() {
    let app = setup().await;

    let ghost = PublicUser {
        id: 999,
        name: "Ghost".into(),
        email: "ghost@x.com".into(),
    };
    let token = TokenService::new(SECRET).issue(&ghost).unwrap();
    let (status, body) = app.get("/api/user", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_list_users_is_public() {
    let app = setup().await;
    app.register_alice().await;

    let (status, body) = app.get("/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "a@x.com");
    assert!(users[0].get("password").is_none());
}

#[tokio::test]
async fn test_store_and_read_quote() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (status, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({
                "company": "Acme",
                "tagName": "T1",
                "poNumber": "PO-42",
                "orderTypes": ["A", "B"],
                "gridSize": "10x10",
                "colour": "Red",
                "measurements": { "w": 10, "h": [1, 2] }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Quote stored");
    let id = body["id"].as_i64().unwrap();

    let (status, body) = app.get("/api/quotes", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0]["id"], id);
    assert_eq!(quotes[0]["company"], "Acme");
    assert_eq!(quotes[0]["tag_name"], "T1");
    assert_eq!(quotes[0]["grid_size"], "10x10");
    assert_eq!(quotes[0]["colour"], "Red");
    assert!(quotes[0]["created_at"].as_str().unwrap().ends_with('Z'));

    let (status, body) = app.get(&format!("/api/quotes/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let quote = &body["quote"];
    assert_eq!(quote["po_number"], "PO-42");
    assert_eq!(quote["order_types"], json!(["A", "B"]));
    assert_eq!(quote["measurements"], json!({ "w": 10, "h": [1, 2] }));
    assert_eq!(quote["delivery"], Value::Null);
}

#[tokio::test]
async fn test_quote_single_order_type_and_empty_fields() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (_, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({ "company": "Acme", "tagName": "T2", "orderTypes": "Rush", "comments": "" }),
        )
        .await;
    let id = body["id"].as_i64().unwrap();

    let (_, body) = app.get(&format!("/api/quotes/{id}"), Some(&token)).await;
    assert_eq!(body["quote"]["order_types"], json!(["Rush"]));
    assert_eq!(body["quote"]["comments"], Value::Null);
    assert_eq!(body["quote"]["measurements"], Value::Null);

    let (_, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({ "company": "Acme", "tagName": "T3", "orderTypes": [] }),
        )
        .await;
    let id = body["id"].as_i64().unwrap();
    let (_, body) = app.get(&format!("/api/quotes/{id}"), Some(&token)).await;
    assert_eq!(body["quote"]["order_types"], Value::Null);
}

#[tokio::test]
async fn test_quote_validation() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (status, body) = app
        .post("/api/quote", Some(&token), json!({ "company": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "company and tagName are required");

    let (status, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({ "company": "", "tagName": "T1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "company and tagName are required");

    let (status, body) = app
        .send_raw(
            Method::POST,
            "/api/quote",
            Some(&token),
            Some("[1, 2".to_string()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_order_type_with_comma_rejected() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (status, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({ "company": "Acme", "tagName": "T1", "orderTypes": ["10,5 mm", "blue"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "orderTypes entries cannot contain commas");

    let (_, body) = app.get("/api/quotes", Some(&token)).await;
    assert!(body["quotes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_numeric_quote_fields_stored_as_text() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (status, body) = app
        .post(
            "/api/quote",
            Some(&token),
            json!({ "company": "Acme", "tagName": "T1", "poNumber": 123, "gridSize": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (_, body) = app.get(&format!("/api/quotes/{id}"), Some(&token)).await;
    assert_eq!(body["quote"]["po_number"], "123");
    assert_eq!(body["quote"]["grid_size"], "10");
}

#[tokio::test]
async fn test_missing_quote_returns_not_found() {
    let app = setup().await;
    let token = app.register_alice().await;

    let (status, body) = app.get("/api/quotes/9999", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Quote not found");
}

#[tokio::test]
async fn test_quote_list_is_newest_first_and_capped() {
    let app = setup().await;
    let token = app.register_alice().await;

    let mut last_id = 0;
    for i in 0..205 {
        let (status, body) = app
            .post(
                "/api/quote",
                Some(&token),
                json!({ "company": format!("Company {i}"), "tagName": "bulk" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        last_id = body["id"].as_i64().unwrap();
    }

    let (_, body) = app.get("/api/quotes", Some(&token)).await;
    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 200);
    assert_eq!(quotes[0]["id"], last_id);
    assert_eq!(quotes[0]["company"], "Company 204");

    let ids: Vec<i64> = quotes.iter().map(|q| q["id"].as_i64().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "OK", "database": "SQLite", "environment": "development" })
    );
}
