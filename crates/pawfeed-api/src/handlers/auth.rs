//! User authentication handlers.

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::Json;
use pawfeed_core::User;
use serde::Deserialize;

use crate::auth::{hash_password, verify_password, SessionInfo};
use crate::error::{ApiError, Result};
use crate::server::AppState;

const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

fn validate_credentials(req: &CredentialsRequest) -> Result<String> {
    let username = req.username.trim().to_string();
    if username.len() < MIN_USERNAME_LEN {
        return Err(ApiError::Validation(
            "Username must be at least 3 characters".into(),
        ));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    Ok(username)
}

fn user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "username": user.username,
        "lastOnline": user.last_online,
    })
}

/// Create a new account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let username = validate_credentials(&req)?;

    if state.storage.users().find_by_username(&username)?.is_some() {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let user = User::new(username, hash_password(&req.password)?);
    state.storage.users().create(&user)?;
    tracing::info!(username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"user": user_json(&user)})),
    ))
}

/// Authenticate and issue a session token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<serde_json::Value>> {
    let username = validate_credentials(&req)?;

    let user = state
        .storage
        .users()
        .find_by_username(&username)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let user = state.storage.users().touch_last_online(&user.id)?;
    let token = state.tokens.sign(&user.id, &user.username);

    Ok(Json(serde_json::json!({
        "token": token,
        "user": user_json(&user),
    })))
}

/// Current authenticated user.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
) -> Result<Json<serde_json::Value>> {
    let user = state
        .storage
        .users()
        .get(&session.user_id)?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".into()))?;

    Ok(Json(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "lastOnline": user.last_online,
        "createdAt": user.created_at,
    })))
}
