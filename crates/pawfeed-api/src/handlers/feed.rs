//! Feed trigger, history and stats handlers.

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pawfeed_core::amount_in_range;
use serde::Deserialize;

use crate::auth::SessionInfo;
use crate::error::{ApiError, Result};
use crate::server::AppState;

/// Grams dispensed when a manual feed names no amount.
const DEFAULT_MANUAL_AMOUNT: u32 = 10;

const DEFAULT_LOG_LIMIT: usize = 20;
const MAX_LOG_LIMIT: usize = 100;

const DEFAULT_STATS_DAYS: u32 = 7;
const MAX_STATS_DAYS: u32 = 31;

#[derive(Debug, Default, Deserialize)]
pub struct ManualFeedRequest {
    pub amount: Option<u32>,
}

/// Trigger a feed right now.
pub async fn manual_feed_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    body: Option<Json<ManualFeedRequest>>,
) -> Result<Json<serde_json::Value>> {
    let amount = body
        .map(|Json(req)| req.amount.unwrap_or(DEFAULT_MANUAL_AMOUNT))
        .unwrap_or(DEFAULT_MANUAL_AMOUNT);
    if !amount_in_range(amount) {
        return Err(ApiError::Validation(
            "Amount must be between 5 and 1000 grams".into(),
        ));
    }

    let log = state
        .orchestrator
        .manual_feed(&session.user_id, amount)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Feeding manual command sent",
        "feedLog": log,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VoiceFeedRequest {
    pub text: Option<String>,
}

/// Trigger a feed from a transcribed voice command.
pub async fn voice_feed_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Json(req): Json<VoiceFeedRequest>,
) -> Result<Response> {
    let text = match req.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            return Err(ApiError::Validation("Text input is required".into()));
        }
    };

    let parsed = match state.voice.parse(&text) {
        Ok(parsed) => parsed,
        Err(e) => {
            // The grammar's message is user-facing; keep the original shape.
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "message": "Invalid voice command",
                    "error": e.to_string(),
                    "parsedText": text,
                })),
            )
                .into_response());
        }
    };

    let log = state
        .orchestrator
        .voice_feed(&session.user_id, parsed.amount, &text)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Voice feeding command sent",
        "feedLog": log,
        "parsedAmount": parsed.amount,
    }))
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Recent feed history, newest first.
pub async fn feed_logs_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    let logs = state
        .storage
        .feed_logs()
        .recent_for_user(&session.user_id, limit)?;
    Ok(Json(serde_json::json!({"feedLogs": logs})))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

/// Daily feeding totals over the last `days` days.
pub async fn weekly_stats_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionInfo>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<serde_json::Value>> {
    let days = query
        .days
        .unwrap_or(DEFAULT_STATS_DAYS)
        .clamp(1, MAX_STATS_DAYS);
    let stats = state.storage.feed_logs().daily_stats(
        &session.user_id,
        days,
        state.timezone,
        chrono::Utc::now(),
    )?;
    Ok(Json(serde_json::json!({"data": stats, "days": days})))
}
