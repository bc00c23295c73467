//! arlm-engine library interface
//!
//! Landmark recognition engine: catalog client, classification gate,
//! proximity index, mode coordinator and the HTTP surface over them.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::api::sensors::FrameLimits;
use crate::config::EngineConfig;
use crate::coordinator::{CoordinatorDeps, ModeCoordinator};
use crate::services::sensors::DEFAULT_FEED_CAPACITY;
use crate::services::weather_client::OpenMeteoClient;
use crate::services::{
    CatalogClient, ChannelSensor, ClassificationGate, Frame, LabelMap, ModelHandle, WeatherSource,
};
use arlm_common::events::EventBus;
use arlm_common::GeoPoint;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Per-subscriber event buffer
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: ModeCoordinator,
    /// Used directly for photo lookups
    pub catalog: CatalogClient,
    pub camera: Arc<ChannelSensor<Frame>>,
    pub location: Arc<ChannelSensor<GeoPoint>>,
    pub vision_available: bool,
    /// Shared with the classification gate
    pub labels: LabelMap,
    pub labels_file: Option<PathBuf>,
    pub frame_limits: FrameLimits,
    /// Cancelled on server shutdown; parent of per-request tokens
    pub shutdown: CancellationToken,
    pub startup_time: DateTime<Utc>,
}

/// Everything `build_engine` needs beyond the config file
pub struct EngineParts {
    pub catalog: CatalogClient,
    pub model: ModelHandle,
    pub weather: Option<Arc<dyn WeatherSource>>,
}

impl EngineParts {
    /// Production parts: reqwest catalog transport and Open-Meteo weather
    pub fn from_config(config: &EngineConfig, model: ModelHandle) -> arlm_common::Result<Self> {
        let (base_url, api_key) = config.backend_credentials()?;
        let catalog = CatalogClient::connect(base_url, api_key, config.retry.clone())
            .map_err(|e| arlm_common::Error::Config(e.to_string()))?;

        let weather: Option<Arc<dyn WeatherSource>> = if config.weather.enabled {
            match OpenMeteoClient::new(&config.weather.base_url) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(error = %e, "Weather client unavailable, continuing without weather");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            catalog,
            model,
            weather,
        })
    }
}

/// Label table from `labels_file` when configured, else the inline table
fn load_labels(config: &EngineConfig) -> LabelMap {
    if let Some(path) = &config.vision.labels_file {
        match LabelMap::from_file(path) {
            Ok(labels) => return labels,
            Err(e) => warn!(error = %e, "Label file unusable, using inline labels"),
        }
    }
    LabelMap::new(config.vision.labels.clone())
}

/// Wire sensors, gate and coordinator together and spawn the coordinator
pub fn build_engine(config: &EngineConfig, parts: EngineParts) -> (AppState, JoinHandle<()>) {
    let gate = ClassificationGate::new(parts.model, load_labels(config))
        .with_min_interval(config.min_interval())
        .with_confidence_threshold(config.vision.confidence_threshold);
    let labels = gate.labels().clone();
    let vision_available = gate.is_available();

    let camera = Arc::new(ChannelSensor::new("camera", DEFAULT_FEED_CAPACITY));
    let location = Arc::new(ChannelSensor::new("location", DEFAULT_FEED_CAPACITY));

    let (coordinator, task) = ModeCoordinator::spawn(
        CoordinatorDeps {
            catalog: parts.catalog.clone(),
            gate: Arc::new(gate),
            camera: camera.clone(),
            location: location.clone(),
            weather: parts.weather,
            events: EventBus::new(EVENT_BUS_CAPACITY),
        },
        config.coordinator_config(),
    );

    let state = AppState {
        coordinator,
        catalog: parts.catalog,
        camera,
        location,
        vision_available,
        labels,
        labels_file: config.vision.labels_file.clone(),
        frame_limits: config.frame_limits(),
        shutdown: CancellationToken::new(),
        startup_time: Utc::now(),
    };
    (state, task)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .merge(api::catalog_routes())
        .merge(api::sensor_routes(state.frame_limits))
        .merge(api::label_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
