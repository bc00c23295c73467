//! Mode coordinator
//!
//! Top-level state machine of an AR session. One actor task owns all state
//! and the sensor subscriptions; [`ModeCoordinator`] is the cheap, cloneable
//! handle used by the HTTP layer and tests.
//!
//! # Modes
//! - **VisualRecognition**: camera frames go through the classification
//!   gate; an accepted, mapped label becomes the recognized landmark.
//! - **GeoBased**: location fixes drive the proximity index; the nearby list
//!   is recomputed when the device moved beyond the movement threshold
//!   (strictly farther than it) or the catalog changed.
//!
//! Switching modes stops the leaving mode's feed before the entered mode's
//! feed starts. Work spawned for a feed or a session is tagged with the
//! feed epoch and the session generation; completions carrying an old tag
//! are dropped.

mod actor;
mod state;

pub use state::{CoordinatorState, RecognizedLandmark};

use crate::services::proximity_index::DEFAULT_RADIUS_M;
use crate::services::{
    CatalogClient, CatalogError, ClassificationGate, Frame, SensorError, SensorFeed, WeatherSource,
};
use arlm_common::events::EventBus;
use arlm_common::models::OperatingMode;
use arlm_common::GeoPoint;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

/// Minimum movement before the nearby list is recomputed
pub const DEFAULT_MOVEMENT_THRESHOLD_M: f64 = 10.0;
/// Recognized landmark is cleared after this long without a new acceptance
pub const DEFAULT_RECOGNITION_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_WEATHER_INTERVAL: Duration = Duration::from_secs(600);

const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator is not running")]
    Stopped,

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Catalog(CatalogError),

    /// A session start or stop happened while the request was in flight
    #[error("Request superseded by a session change")]
    Superseded,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Mode the coordinator starts in
    pub initial_mode: OperatingMode,
    pub radius_m: f64,
    pub movement_threshold_m: f64,
    pub recognition_timeout: Duration,
    pub weather_interval: Duration,
    /// Periodic catalog refresh while a session runs; `None` disables it
    pub catalog_refresh_interval: Option<Duration>,
    /// Used for weather until the first location fix arrives
    pub default_location: GeoPoint,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            initial_mode: OperatingMode::default(),
            radius_m: DEFAULT_RADIUS_M,
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            recognition_timeout: DEFAULT_RECOGNITION_TIMEOUT,
            weather_interval: DEFAULT_WEATHER_INTERVAL,
            catalog_refresh_interval: None,
            default_location: GeoPoint::new(47.3769, 8.5417),
        }
    }
}

impl CoordinatorConfig {
    /// Replace timer periods the actor cannot run with: a zero weather
    /// interval falls back to the default, a zero catalog refresh disables it
    pub fn sanitized(mut self) -> Self {
        if self.weather_interval.is_zero() {
            warn!("Zero weather interval, using {:?}", DEFAULT_WEATHER_INTERVAL);
            self.weather_interval = DEFAULT_WEATHER_INTERVAL;
        }
        if self.catalog_refresh_interval.is_some_and(|d| d.is_zero()) {
            warn!("Zero catalog refresh interval, periodic refresh disabled");
            self.catalog_refresh_interval = None;
        }
        self
    }
}

/// Everything the coordinator drives
pub struct CoordinatorDeps {
    pub catalog: CatalogClient,
    pub gate: Arc<ClassificationGate>,
    pub camera: Arc<dyn SensorFeed<Frame>>,
    pub location: Arc<dyn SensorFeed<GeoPoint>>,
    /// Weather is decoration; `None` disables it
    pub weather: Option<Arc<dyn WeatherSource>>,
    pub events: EventBus,
}

pub(crate) enum Command {
    StartSession(oneshot::Sender<Result<(), CoordinatorError>>),
    StopSession(oneshot::Sender<()>),
    SwitchMode(OperatingMode, oneshot::Sender<Result<(), CoordinatorError>>),
    RefreshCatalog(oneshot::Sender<Result<usize, CoordinatorError>>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the coordinator actor
#[derive(Clone)]
pub struct ModeCoordinator {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<CoordinatorState>,
    events: EventBus,
}

impl ModeCoordinator {
    /// Spawn the actor task. It exits on [`shutdown`](Self::shutdown) or when
    /// every handle has been dropped.
    pub fn spawn(deps: CoordinatorDeps, config: CoordinatorConfig) -> (Self, JoinHandle<()>) {
        let config = config.sanitized();
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(CoordinatorState::new(config.initial_mode));
        let events = deps.events.clone();

        let task = tokio::spawn(actor::run(deps, config, state_tx, command_rx));

        (
            Self {
                commands,
                state_rx,
                events,
            },
            task,
        )
    }

    /// Start the sensors of the current mode and load the catalog.
    /// Idempotent while a session is running.
    pub async fn start_session(&self) -> Result<(), CoordinatorError> {
        self.request(Command::StartSession).await?
    }

    /// Stop all sensors, cancel in-flight work and reset session state.
    /// Idempotent.
    pub async fn stop_session(&self) -> Result<(), CoordinatorError> {
        self.request(Command::StopSession).await
    }

    pub async fn switch_to_visual_mode(&self) -> Result<(), CoordinatorError> {
        self.switch_mode(OperatingMode::VisualRecognition).await
    }

    pub async fn switch_to_geo_mode(&self) -> Result<(), CoordinatorError> {
        self.switch_mode(OperatingMode::GeoBased).await
    }

    pub async fn switch_mode(&self, mode: OperatingMode) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::SwitchMode(mode, reply)).await?
    }

    /// Fetch a fresh catalog snapshot; resolves to the landmark count once
    /// the snapshot is installed
    pub async fn refresh_catalog(&self) -> Result<usize, CoordinatorError> {
        self.request(Command::RefreshCatalog).await?
    }

    /// Stop the session (if any) and end the actor task
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.request(Command::Shutdown).await
    }

    /// Latest published state
    pub fn current(&self) -> CoordinatorState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state_rx.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }
}
