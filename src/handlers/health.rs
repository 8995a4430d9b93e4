use crate::routes::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "database": state.db.manager().kind().display_name(),
        "environment": &*state.environment,
    }))
}
