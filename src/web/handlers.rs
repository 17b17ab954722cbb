//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub async fn handle_get_backups(State(state): State<AppState>) -> impl IntoResponse {
    match state.builder.get_report().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            let message = format!("Error processing backups request: {}", e);
            tracing::error!("{}", message);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
        }
    }
}

pub async fn handle_cache_flush(State(state): State<AppState>) -> impl IntoResponse {
    match state.builder.invalidate_cache() {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            let message = format!("Error processing cache invalidate request: {}", e);
            tracing::error!("{}", message);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
        }
    }
}
