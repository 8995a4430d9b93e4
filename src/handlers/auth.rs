//! Registration, login and user lookup.

use crate::auth::AuthUser;
use crate::db::Operation;
use crate::error::{ApiError, ApiResult, DbError};
use crate::handlers::json_body;
use crate::models::{
    AuthResponse, LoginRequest, PublicUser, RegisterRequest, UserProfile, UserRecord,
};
use crate::routes::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::info;

const EMAIL_TAKEN: &str = "Email already registered";
const BAD_CREDENTIALS: &str = "Invalid email or password";

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let new_user = json_body(payload)?
        .validate()
        .map_err(ApiError::validation)?;

    // Advisory only; the unique index decides races
    let existing: Option<UserRecord> = state
        .db
        .fetch_optional(&Operation::FindUserByEmail {
            email: new_user.email.clone(),
        })
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
    }

    let password_hash = state.passwords.hash(new_user.password).await?;

    let id = match state
        .db
        .insert(&Operation::InsertUser {
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash,
        })
        .await
    {
        Ok(id) => id,
        Err(DbError::Conflict { .. }) => return Err(ApiError::Conflict(EMAIL_TAKEN.into())),
        Err(e) => return Err(e.into()),
    };

    let user = PublicUser {
        id,
        name: new_user.name,
        email: new_user.email,
    };
    let token = state.tokens.issue(&user)?;
    info!(user_id = id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Account created successfully".into(),
            token,
            user,
        }),
    ))
}

/// `POST /api/login`
///
/// Unknown email and wrong password produce the same response.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let (email, password) = json_body(payload)?
        .validate()
        .map_err(ApiError::validation)?;

    let record: Option<UserRecord> = state
        .db
        .fetch_optional(&Operation::FindUserByEmail { email })
        .await?;
    let Some(record) = record else {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !state
        .passwords
        .verify(password, record.password.clone())
        .await?
    {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let user = PublicUser::from(&record);
    let token = state.tokens.issue(&user)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user,
    }))
}

/// `GET /api/user`
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Value>> {
    let profile: Option<UserProfile> = state
        .db
        .fetch_optional(&Operation::FindUserById { id: claims.id })
        .await?;
    match profile {
        Some(user) => Ok(Json(json!({ "user": user }))),
        None => Err(ApiError::NotFound("User not found".into())),
    }
}

/// `GET /api/users`
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users: Vec<UserProfile> = state.db.fetch_all(&Operation::ListUsers).await?;
    Ok(Json(json!({ "users": users })))
}
