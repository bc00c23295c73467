//! Catalog listing, photos and on-demand refresh

use crate::error::ApiResult;
use crate::AppState;
use arlm_common::models::{Landmark, LandmarkPhoto};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct LandmarkQuery {
    /// Comma-separated category ids; absent or empty means all
    pub category: Option<String>,
}

/// GET /landmarks?category=<id>[,<id>...]
///
/// Served from the current snapshot, ordered by name.
pub async fn list_landmarks(
    State(state): State<AppState>,
    Query(query): Query<LandmarkQuery>,
) -> Json<Vec<Landmark>> {
    let selected: HashSet<String> = query
        .category
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let current = state.coordinator.current();
    let landmarks = current
        .catalog
        .filter_by_categories(&selected)
        .into_iter()
        .cloned()
        .collect();
    Json(landmarks)
}

/// GET /landmarks/:id/photos
pub async fn list_photos(
    State(state): State<AppState>,
    Path(landmark_id): Path<String>,
) -> ApiResult<Json<Vec<LandmarkPhoto>>> {
    debug!(landmark_id = %landmark_id, "Fetching landmark photos");
    let cancel = state.shutdown.child_token();
    let photos = state.catalog.fetch_photos(&landmark_id, &cancel).await?;
    Ok(Json(photos))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub landmark_count: usize,
}

/// POST /catalog/refresh
pub async fn refresh_catalog(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let landmark_count = state.coordinator.refresh_catalog().await?;
    Ok(Json(RefreshResponse { landmark_count }))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/landmarks", get(list_landmarks))
        .route("/landmarks/:id/photos", get(list_photos))
        .route("/catalog/refresh", post(refresh_catalog))
}
