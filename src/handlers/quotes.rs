//! Quote submission and listing.

use crate::auth::AuthUser;
use crate::db::Operation;
use crate::error::{ApiError, ApiResult};
use crate::handlers::json_body;
use crate::models::{MAX_QUOTE_LIST_LIMIT, QuoteDetail, QuoteRecord, QuoteRequest, QuoteSummary};
use crate::routes::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::info;

/// `POST /api/quote`
pub async fn create_quote(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let quote = json_body(payload)?
        .validate()
        .map_err(ApiError::validation)?;

    let id = state.db.insert(&Operation::InsertQuote(quote)).await?;
    info!(quote_id = id, user_id = claims.id, "Quote stored");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Quote stored", "id": id })),
    ))
}

/// `GET /api/quotes`: newest first, at most 200.
pub async fn list_quotes(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Value>> {
    let quotes: Vec<QuoteSummary> = state
        .db
        .fetch_all(&Operation::ListQuotes {
            limit: MAX_QUOTE_LIST_LIMIT,
        })
        .await?;
    Ok(Json(json!({ "quotes": quotes })))
}

/// `GET /api/quotes/{id}`
pub async fn get_quote(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let record: Option<QuoteRecord> = state
        .db
        .fetch_optional(&Operation::FindQuoteById { id })
        .await?;
    match record {
        Some(record) => Ok(Json(json!({ "quote": QuoteDetail::from(record) }))),
        None => Err(ApiError::NotFound("Quote not found".into())),
    }
}
