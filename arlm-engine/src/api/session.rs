//! Session lifecycle, mode switching and the state snapshot

use crate::coordinator::CoordinatorState;
use crate::error::ApiResult;
use crate::AppState;
use arlm_common::models::OperatingMode;
use arlm_common::GeoPoint;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct RecognizedView {
    pub id: String,
    pub name: String,
    pub label: String,
    pub confidence: f32,
    pub confidence_percent: u8,
}

#[derive(Debug, Serialize)]
pub struct NearbyView {
    pub id: String,
    pub name: String,
    pub category_icon: Option<String>,
    pub distance_m: f64,
    /// "420 m" / "1.3 km"
    pub distance: String,
}

#[derive(Debug, Serialize)]
pub struct WeatherView {
    pub temperature_c: f64,
    pub temperature: String,
    pub icon: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CatalogSummary {
    pub landmark_count: usize,
    pub category_count: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Serializable view of [`CoordinatorState`]
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub mode: OperatingMode,
    pub session_active: bool,
    pub generation: u64,
    pub recognized: Option<RecognizedView>,
    pub nearby: Vec<NearbyView>,
    /// Identifiers the presentation layer should show for the active mode
    pub displayed: Vec<String>,
    pub last_location: Option<GeoPoint>,
    pub weather: Option<WeatherView>,
    pub catalog: CatalogSummary,
    pub catalog_error: Option<String>,
}

impl From<&CoordinatorState> for StateResponse {
    fn from(state: &CoordinatorState) -> Self {
        Self {
            mode: state.mode,
            session_active: state.session_active,
            generation: state.generation,
            recognized: state.recognized.as_ref().map(|r| RecognizedView {
                id: r.landmark.id.clone(),
                name: r.landmark.name.clone(),
                label: r.label.clone(),
                confidence: r.confidence,
                confidence_percent: (r.confidence.clamp(0.0, 1.0) * 100.0) as u8,
            }),
            nearby: state
                .nearby
                .iter()
                .map(|e| NearbyView {
                    id: e.landmark.id.clone(),
                    name: e.landmark.name.clone(),
                    category_icon: e.landmark.category.as_ref().and_then(|c| c.icon.clone()),
                    distance_m: e.distance_m,
                    distance: e.formatted_distance(),
                })
                .collect(),
            displayed: state
                .displayed_landmarks()
                .into_iter()
                .map(|l| l.id.clone())
                .collect(),
            last_location: state.last_location,
            weather: state.weather.as_ref().map(|w| WeatherView {
                temperature_c: w.temperature_c,
                temperature: w.temperature_formatted(),
                icon: w.icon_emoji().to_string(),
                fetched_at: w.fetched_at,
            }),
            catalog: CatalogSummary {
                landmark_count: state.catalog.len(),
                category_count: state.catalog.categories().len(),
                fetched_at: state.catalog.fetched_at(),
            },
            catalog_error: state.catalog_error.clone(),
        }
    }
}

fn current_state(state: &AppState) -> Json<StateResponse> {
    Json(StateResponse::from(&state.coordinator.current()))
}

/// GET /state
pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    current_state(&state)
}

/// POST /session/start
pub async fn start_session(State(state): State<AppState>) -> ApiResult<Json<StateResponse>> {
    info!("Session start requested");
    state.coordinator.start_session().await?;
    Ok(current_state(&state))
}

/// POST /session/stop
pub async fn stop_session(State(state): State<AppState>) -> ApiResult<Json<StateResponse>> {
    info!("Session stop requested");
    state.coordinator.stop_session().await?;
    Ok(current_state(&state))
}

/// POST /mode/visual
pub async fn switch_to_visual(State(state): State<AppState>) -> ApiResult<Json<StateResponse>> {
    state.coordinator.switch_to_visual_mode().await?;
    Ok(current_state(&state))
}

/// POST /mode/geo
pub async fn switch_to_geo(State(state): State<AppState>) -> ApiResult<Json<StateResponse>> {
    state.coordinator.switch_to_geo_mode().await?;
    Ok(current_state(&state))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .route("/mode/visual", post(switch_to_visual))
        .route("/mode/geo", post(switch_to_geo))
}
