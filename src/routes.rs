//! Router and shared request state.

use crate::auth::{PasswordHasher, TokenService};
use crate::config::Config;
use crate::db::{ConnectionManager, QueryExecutor};
use crate::handlers::{auth, health, quotes};
use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: QueryExecutor,
    pub tokens: Arc<TokenService>,
    pub passwords: PasswordHasher,
    pub environment: Arc<str>,
}

impl AppState {
    pub fn new(manager: Arc<ConnectionManager>, config: &Config) -> Self {
        Self {
            db: QueryExecutor::new(manager),
            tokens: Arc::new(TokenService::new(&config.jwt_secret)),
            passwords: PasswordHasher::new(config.bcrypt_cost),
            environment: Arc::from(config.environment.as_str()),
        }
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Create the router with all API routes. When `static_dir` is set, any
/// other path is served from that directory.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/user", get(auth::current_user))
        .route("/api/users", get(auth::list_users))
        .route("/api/quote", post(quotes::create_quote))
        .route("/api/quotes", get(quotes::list_quotes))
        .route("/api/quotes/{id}", get(quotes::get_quote))
        .route("/api/health", get(health::health));

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
