//! HTTP request handlers.

pub mod auth;
pub mod health;
pub mod quotes;

use crate::error::{ApiError, ApiResult};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use tracing::debug;

/// Unwrap a JSON body, reporting any rejection as a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Rejected request body");
            Err(ApiError::validation("Invalid JSON body"))
        }
    }
}
