//! Schedule CRUD handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use pawfeed_core::{amount_in_range, valid_days_of_week, valid_schedule_time, Schedule};
use pawfeed_storage::ScheduleUpdate;
use serde::Deserialize;

use crate::auth::SessionInfo;
use crate::error::{ApiError, Result};
use crate::server::AppState;

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePayload {
    pub name: Option<String>,
    pub time: String,
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    pub amount: u32,
}

fn validate_payload(payload: &SchedulePayload) -> Result<()> {
    if !valid_schedule_time(&payload.time) {
        return Err(ApiError::Validation("Time must be in HH:MM format".into()));
    }
    if let Some(days) = &payload.days_of_week {
        if !valid_days_of_week(days) {
            return Err(ApiError::Validation(
                "Day values must be between 0 and 6".into(),
            ));
        }
    }
    if !amount_in_range(payload.amount) {
        return Err(ApiError::Validation(
            "Amount must be between 5 and 1000 grams".into(),
        ));
    }
    if let Some(name) = &payload.name {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(ApiError::Validation(
                "Name must be between 1 and 50 characters".into(),
            ));
        }
    }
    Ok(())
}

/// List the caller's schedules, sorted by time.
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
) -> Result<Json<serde_json::Value>> {
    let schedules = state.storage.schedules().list_for_user(&session.user_id)?;
    Ok(Json(serde_json::json!({"schedules": schedules})))
}

/// Create a schedule.
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Json(payload): Json<SchedulePayload>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    validate_payload(&payload)?;

    let schedule = Schedule::new(
        &session.user_id,
        payload.name.map(|n| n.trim().to_string()),
        payload.time,
        payload.days_of_week.unwrap_or_default(),
        payload.amount,
    );
    state.storage.schedules().create(&schedule)?;
    tracing::info!(schedule_id = %schedule.id, user_id = %session.user_id, "schedule created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"schedule": schedule})),
    ))
}

/// Replace a schedule's fields.
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Path(id): Path<String>,
    Json(payload): Json<SchedulePayload>,
) -> Result<Json<serde_json::Value>> {
    validate_payload(&payload)?;

    let update = ScheduleUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        time: Some(payload.time),
        days_of_week: payload.days_of_week,
        amount: Some(payload.amount),
    };
    let schedule = state
        .storage
        .schedules()
        .update(&session.user_id, &id, update)?;

    Ok(Json(serde_json::json!({"schedule": schedule})))
}

/// Delete a schedule.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.storage.schedules().delete(&session.user_id, &id)?;
    tracing::info!(schedule_id = %id, user_id = %session.user_id, "schedule deleted");
    Ok(Json(
        serde_json::json!({"message": "Schedule deleted successfully"}),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePayload {
    pub is_active: Option<bool>,
}

/// Enable/disable a schedule; flips when no explicit value is given.
pub async fn toggle_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Path(id): Path<String>,
    body: Option<Json<TogglePayload>>,
) -> Result<Json<serde_json::Value>> {
    let is_active = body.and_then(|Json(payload)| payload.is_active);
    let schedule = state
        .storage
        .schedules()
        .toggle(&session.user_id, &id, is_active)?;
    Ok(Json(serde_json::json!({"schedule": schedule})))
}
