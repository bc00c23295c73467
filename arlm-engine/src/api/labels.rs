//! Classifier label table reload

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub label_count: usize,
}

/// POST /labels/reload
///
/// Re-reads the configured labels file. The gate sees the new table on its
/// next frame; a bad file leaves the current table in place.
pub async fn reload_labels(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let path = state
        .labels_file
        .clone()
        .ok_or_else(|| ApiError::Conflict("no labels_file configured".to_string()))?;

    let labels = state.labels.clone();
    tokio::task::spawn_blocking(move || labels.reload_from(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("label reload task failed: {e}")))?
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(ReloadResponse {
        label_count: state.labels.len(),
    }))
}

pub fn label_routes() -> Router<AppState> {
    Router::new().route("/labels/reload", post(reload_labels))
}
