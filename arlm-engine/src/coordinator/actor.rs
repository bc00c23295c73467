//! Coordinator actor loop
//!
//! Single owner of [`CoordinatorState`]. Commands arrive on a bounded
//! mailbox, completions of spawned work on an internal channel, and sensor
//! readings straight from the active feed's receiver.

use super::{Command, CoordinatorConfig, CoordinatorDeps, CoordinatorError, CoordinatorState, RecognizedLandmark};
use crate::services::proximity_index;
use crate::services::weather_client::WeatherError;
use crate::services::{
    CatalogClient, CatalogError, ClassificationGate, Frame, RecognitionResult, SensorFeed, Weather, WeatherSource,
};
use arlm_common::events::{ArEvent, EventBus};
use arlm_common::geo::distance_m;
use arlm_common::models::{CatalogSnapshot, OperatingMode};
use arlm_common::GeoPoint;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Completions of work the actor spawned
enum Internal {
    Classified {
        generation: u64,
        epoch: u64,
        result: Option<RecognitionResult>,
    },
    CatalogFetched {
        generation: u64,
        result: Result<CatalogSnapshot, CatalogError>,
        reply: Option<oneshot::Sender<Result<usize, CoordinatorError>>>,
    },
    WeatherFetched {
        generation: u64,
        result: Result<Weather, WeatherError>,
    },
}

pub(super) async fn run(
    deps: CoordinatorDeps,
    config: CoordinatorConfig,
    state_tx: watch::Sender<CoordinatorState>,
    commands: mpsc::Receiver<Command>,
) {
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let actor = CoordinatorActor {
        state: CoordinatorState::new(config.initial_mode),
        config,
        catalog: deps.catalog,
        gate: deps.gate,
        camera: deps.camera,
        location: deps.location,
        weather: deps.weather,
        events: deps.events,
        state_tx,
        internal_tx,
        session_cancel: CancellationToken::new(),
        feed_epoch: 0,
        frames: None,
        fixes: None,
        classify_task: None,
        recognition_deadline: None,
        nearby_origin: None,
        weather_timer: None,
        catalog_timer: None,
    };
    actor.run(commands, internal_rx).await;
}

struct CoordinatorActor {
    config: CoordinatorConfig,
    catalog: CatalogClient,
    gate: Arc<ClassificationGate>,
    camera: Arc<dyn SensorFeed<Frame>>,
    location: Arc<dyn SensorFeed<GeoPoint>>,
    weather: Option<Arc<dyn WeatherSource>>,
    events: EventBus,

    state: CoordinatorState,
    state_tx: watch::Sender<CoordinatorState>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    /// Cancelled on session stop; replaced with a fresh token afterwards
    session_cancel: CancellationToken,
    /// Bumped whenever a sensor feed stops
    feed_epoch: u64,
    frames: Option<mpsc::Receiver<Frame>>,
    fixes: Option<mpsc::Receiver<GeoPoint>>,
    classify_task: Option<JoinHandle<()>>,
    recognition_deadline: Option<Instant>,
    /// Location and catalog the current nearby list was computed from
    nearby_origin: Option<(GeoPoint, Arc<CatalogSnapshot>)>,
    weather_timer: Option<Interval>,
    catalog_timer: Option<Interval>,
}

impl CoordinatorActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!(mode = %self.state.mode, "Mode coordinator started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All coordinator handles dropped");
                        break;
                    };
                    if let Some(reply) = self.handle_command(command) {
                        self.stop_session();
                        let _ = reply.send(());
                        break;
                    }
                }

                Some(message) = internal.recv() => self.handle_internal(message),

                frame = next_item(&mut self.frames) => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => {
                        debug!("Camera feed closed");
                        self.frames = None;
                    }
                },

                fix = next_item(&mut self.fixes) => match fix {
                    Some(fix) => self.handle_location(fix),
                    None => {
                        debug!("Location feed closed");
                        self.fixes = None;
                    }
                },

                _ = sleep_until(self.recognition_deadline) => self.expire_recognition(),

                _ = tick(&mut self.weather_timer) => self.spawn_weather_fetch(),

                _ = tick(&mut self.catalog_timer) => {
                    debug!("Periodic catalog refresh");
                    self.spawn_catalog_fetch(None);
                }
            }
        }

        self.stop_session();
        info!("Mode coordinator stopped");
    }

    /// Returns the shutdown reply when the loop should end
    fn handle_command(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::StartSession(reply) => {
                let _ = reply.send(self.start_session());
            }
            Command::StopSession(reply) => {
                self.stop_session();
                let _ = reply.send(());
            }
            Command::SwitchMode(mode, reply) => {
                let _ = reply.send(self.switch_mode(mode));
            }
            Command::RefreshCatalog(reply) => self.spawn_catalog_fetch(Some(reply)),
            Command::Shutdown(reply) => return Some(reply),
        }
        None
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Classified {
                generation,
                epoch,
                result,
            } => self.apply_classification(generation, epoch, result),
            Internal::CatalogFetched {
                generation,
                result,
                reply,
            } => self.apply_catalog(generation, result, reply),
            Internal::WeatherFetched { generation, result } => self.apply_weather(generation, result),
        }
    }

    // ---- session lifecycle ----

    fn start_session(&mut self) -> Result<(), CoordinatorError> {
        if self.state.session_active {
            debug!("Session already active");
            return Ok(());
        }

        self.start_feed(self.state.mode)?;

        self.state.generation += 1;
        self.state.session_active = true;
        info!(
            generation = self.state.generation,
            mode = %self.state.mode,
            "AR session started"
        );

        self.spawn_catalog_fetch(None);
        if self.weather.is_some() {
            self.spawn_weather_fetch();
            self.weather_timer = Some(interval_after(self.config.weather_interval));
        }
        self.catalog_timer = self.config.catalog_refresh_interval.map(interval_after);

        self.events.emit_lossy(ArEvent::SessionStarted {
            generation: self.state.generation,
            mode: self.state.mode,
            timestamp: Utc::now(),
        });
        self.publish();
        Ok(())
    }

    fn stop_session(&mut self) {
        if !self.state.session_active {
            return;
        }

        self.stop_feed(self.state.mode);
        self.session_cancel.cancel();
        self.session_cancel = CancellationToken::new();
        self.weather_timer = None;
        self.catalog_timer = None;
        self.recognition_deadline = None;
        self.nearby_origin = None;

        self.state.generation += 1;
        self.state.reset_session();
        info!(generation = self.state.generation, "AR session stopped");

        self.events.emit_lossy(ArEvent::SessionStopped {
            generation: self.state.generation,
            timestamp: Utc::now(),
        });
        self.publish();
    }

    fn switch_mode(&mut self, target: OperatingMode) -> Result<(), CoordinatorError> {
        let old_mode = self.state.mode;
        if old_mode == target {
            trace!(mode = %target, "Already in requested mode");
            return Ok(());
        }

        if self.state.session_active {
            self.stop_feed(old_mode);
        }

        match old_mode {
            OperatingMode::VisualRecognition => {
                self.recognition_deadline = None;
                if self.state.recognized.take().is_some() {
                    self.emit_recognition_cleared();
                }
            }
            OperatingMode::GeoBased => {
                self.state.nearby.clear();
                self.nearby_origin = None;
            }
        }

        self.state.mode = target;
        info!(%old_mode, new_mode = %target, "Operating mode switched");
        self.events.emit_lossy(ArEvent::ModeChanged {
            generation: self.state.generation,
            old_mode,
            new_mode: target,
            timestamp: Utc::now(),
        });

        let started = if self.state.session_active {
            self.start_feed(target)
        } else {
            Ok(())
        };
        self.publish();
        started
    }

    // ---- sensor feeds ----

    fn start_feed(&mut self, mode: OperatingMode) -> Result<(), CoordinatorError> {
        match mode {
            OperatingMode::VisualRecognition => {
                let rx = self.camera.start().map_err(|e| {
                    warn!(error = %e, "Camera feed failed to start");
                    e
                })?;
                self.frames = Some(rx);
            }
            OperatingMode::GeoBased => {
                let rx = self.location.start().map_err(|e| {
                    warn!(error = %e, "Location feed failed to start");
                    e
                })?;
                self.fixes = Some(rx);
            }
        }
        debug!(%mode, epoch = self.feed_epoch, "Sensor feed started");
        Ok(())
    }

    fn stop_feed(&mut self, mode: OperatingMode) {
        match mode {
            OperatingMode::VisualRecognition => {
                self.camera.stop();
                self.frames = None;
                if let Some(task) = self.classify_task.take() {
                    task.abort();
                }
            }
            OperatingMode::GeoBased => {
                self.location.stop();
                self.fixes = None;
            }
        }
        self.feed_epoch += 1;
        debug!(%mode, epoch = self.feed_epoch, "Sensor feed stopped");
    }

    // ---- visual recognition ----

    fn handle_frame(&mut self, frame: Frame) {
        if self
            .classify_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            trace!("Frame dropped: classification in flight");
            return;
        }

        let gate = Arc::clone(&self.gate);
        let tx = self.internal_tx.clone();
        let cancel = self.session_cancel.clone();
        let generation = self.state.generation;
        let epoch = self.feed_epoch;

        self.classify_task = Some(tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = gate.classify(frame) => result,
            };
            let _ = tx.send(Internal::Classified {
                generation,
                epoch,
                result,
            });
        }));
    }

    fn apply_classification(&mut self, generation: u64, epoch: u64, result: Option<RecognitionResult>) {
        if generation != self.state.generation
            || epoch != self.feed_epoch
            || self.state.mode != OperatingMode::VisualRecognition
        {
            trace!(generation, epoch, "Discarding stale classification");
            return;
        }
        self.classify_task = None;

        // Rejected or throttled: leave the current recognition to the timeout
        let Some(result) = result else {
            return;
        };

        let landmark = result
            .landmark_id
            .as_deref()
            .and_then(|id| self.state.catalog.get(id))
            .cloned();

        let Some(landmark) = landmark else {
            debug!(
                label = %result.label,
                landmark_id = ?result.landmark_id,
                "Accepted label does not resolve to a catalog landmark"
            );
            self.recognition_deadline = None;
            if self.state.recognized.take().is_some() {
                self.emit_recognition_cleared();
                self.publish();
            }
            return;
        };

        self.recognition_deadline = Some(Instant::now() + self.config.recognition_timeout);

        let changed = self.state.recognized_id() != Some(landmark.id.as_str());
        if changed {
            info!(
                landmark_id = %landmark.id,
                label = %result.label,
                confidence = result.confidence,
                "Landmark recognized"
            );
            self.events.emit_lossy(ArEvent::LandmarkRecognized {
                generation: self.state.generation,
                landmark_id: landmark.id.clone(),
                label: result.label.clone(),
                confidence: result.confidence,
                timestamp: Utc::now(),
            });
        }

        self.state.recognized = Some(RecognizedLandmark {
            landmark,
            label: result.label,
            confidence: result.confidence,
        });
        self.publish();
    }

    fn expire_recognition(&mut self) {
        self.recognition_deadline = None;
        if self.state.recognized.take().is_some() {
            debug!("Recognition timed out");
            self.emit_recognition_cleared();
            self.publish();
        }
    }

    fn emit_recognition_cleared(&self) {
        self.events.emit_lossy(ArEvent::RecognitionCleared {
            generation: self.state.generation,
            timestamp: Utc::now(),
        });
    }

    // ---- geo mode ----

    fn handle_location(&mut self, fix: GeoPoint) {
        if !fix.is_valid() {
            warn!(latitude = fix.latitude, longitude = fix.longitude, "Ignoring invalid location fix");
            return;
        }

        self.state.last_location = Some(fix);

        let needs_recompute = match &self.nearby_origin {
            Some((origin, catalog)) => {
                !Arc::ptr_eq(catalog, &self.state.catalog)
                    || distance_m(origin, &fix) > self.config.movement_threshold_m
            }
            None => true,
        };

        if needs_recompute {
            self.recompute_nearby(fix);
        } else {
            trace!("Movement below threshold, nearby list kept");
        }
        self.publish();
    }

    fn recompute_nearby(&mut self, location: GeoPoint) {
        let catalog = Arc::clone(&self.state.catalog);
        self.state.nearby = proximity_index::nearby(location, catalog.landmarks(), self.config.radius_m);
        self.nearby_origin = Some((location, catalog));

        debug!(
            count = self.state.nearby.len(),
            radius_m = self.config.radius_m,
            "Nearby landmarks recomputed"
        );
        self.events.emit_lossy(ArEvent::NearbyLandmarksUpdated {
            generation: self.state.generation,
            count: self.state.nearby.len(),
            nearest_id: self.state.nearby.first().map(|e| e.landmark.id.clone()),
            timestamp: Utc::now(),
        });
    }

    // ---- catalog ----

    fn spawn_catalog_fetch(&mut self, reply: Option<oneshot::Sender<Result<usize, CoordinatorError>>>) {
        let client = self.catalog.clone();
        let cancel = self.session_cancel.clone();
        let tx = self.internal_tx.clone();
        let generation = self.state.generation;

        tokio::spawn(async move {
            let result = client.fetch_snapshot(&cancel).await;
            let _ = tx.send(Internal::CatalogFetched {
                generation,
                result,
                reply,
            });
        });
    }

    fn apply_catalog(
        &mut self,
        generation: u64,
        result: Result<CatalogSnapshot, CatalogError>,
        reply: Option<oneshot::Sender<Result<usize, CoordinatorError>>>,
    ) {
        if generation != self.state.generation {
            debug!(generation, "Discarding catalog result from an earlier session");
            if let Some(reply) = reply {
                let _ = reply.send(Err(CoordinatorError::Superseded));
            }
            return;
        }

        let outcome = match result {
            Ok(snapshot) => {
                let count = snapshot.len();
                self.install_catalog(snapshot);
                Ok(count)
            }
            Err(e) => {
                match e.user_message() {
                    Some(message) => {
                        error!(error = %e, "Catalog load failed");
                        self.events.emit_lossy(ArEvent::CatalogFailed {
                            generation: self.state.generation,
                            message: message.clone(),
                            timestamp: Utc::now(),
                        });
                        self.state.catalog_error = Some(message);
                        self.publish();
                    }
                    None => debug!("Catalog load cancelled"),
                }
                Err(CoordinatorError::Catalog(e))
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn install_catalog(&mut self, snapshot: CatalogSnapshot) {
        let catalog = Arc::new(snapshot);
        info!(
            landmarks = catalog.len(),
            categories = catalog.categories().len(),
            "Catalog snapshot installed"
        );
        self.events.emit_lossy(ArEvent::CatalogLoaded {
            generation: self.state.generation,
            landmark_count: catalog.len(),
            category_count: catalog.categories().len(),
            timestamp: Utc::now(),
        });

        self.state.catalog = Arc::clone(&catalog);
        self.state.catalog_error = None;

        // Re-resolve derived values against the new snapshot
        if let Some(recognized) = self.state.recognized.take() {
            match catalog.get(&recognized.landmark.id) {
                Some(landmark) => {
                    self.state.recognized = Some(RecognizedLandmark {
                        landmark: landmark.clone(),
                        ..recognized
                    });
                }
                None => {
                    self.recognition_deadline = None;
                    self.emit_recognition_cleared();
                }
            }
        }

        if self.state.mode == OperatingMode::GeoBased && self.state.session_active {
            if let Some(location) = self.state.last_location {
                self.recompute_nearby(location);
            }
        }

        self.publish();
    }

    // ---- weather ----

    fn spawn_weather_fetch(&mut self) {
        let Some(source) = self.weather.clone() else {
            return;
        };
        let location = self.state.last_location.unwrap_or(self.config.default_location);
        let cancel = self.session_cancel.clone();
        let tx = self.internal_tx.clone();
        let generation = self.state.generation;

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = source.current(location) => result,
            };
            let _ = tx.send(Internal::WeatherFetched { generation, result });
        });
    }

    fn apply_weather(&mut self, generation: u64, result: Result<Weather, WeatherError>) {
        if generation != self.state.generation {
            return;
        }
        match result {
            Ok(weather) => {
                debug!(temperature_c = weather.temperature_c, "Weather updated");
                self.events.emit_lossy(ArEvent::WeatherUpdated {
                    generation,
                    temperature_c: weather.temperature_c,
                    timestamp: Utc::now(),
                });
                self.state.weather = Some(weather);
                self.publish();
            }
            Err(e) => debug!(error = %e, "Weather fetch failed, keeping last value"),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

fn interval_after(period: std::time::Duration) -> Interval {
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn next_item<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
