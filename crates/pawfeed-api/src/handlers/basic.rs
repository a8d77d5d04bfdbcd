//! Health endpoints.

use axum::response::Json;
use chrono::Utc;

/// Liveness probe.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}
