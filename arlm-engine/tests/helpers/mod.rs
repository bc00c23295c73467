//! Test helper utilities
//!
//! Scripted stand-ins for the catalog backend, the classifier, the sensors
//! and the weather service, plus a coordinator harness wiring them up.

#![allow(dead_code)]

pub mod fixtures;
pub mod transport;

pub use fixtures::*;
pub use transport::{Reply, ScriptedTransport};

use arlm_common::events::{ArEvent, EventBus};
use arlm_common::GeoPoint;
use arlm_engine::coordinator::{CoordinatorConfig, CoordinatorDeps, CoordinatorState, ModeCoordinator};
use arlm_engine::services::classification_gate::{Classification, InferenceError, LandmarkClassifier};
use arlm_engine::services::weather_client::WeatherError;
use arlm_engine::services::{
    CatalogClient, ChannelSensor, ClassificationGate, Frame, LabelMap, ModelHandle, RetryPolicy, SensorError,
    SensorFeed, Weather, WeatherSource,
};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// Classifier whose next answer the test sets
#[derive(Default)]
pub struct ScriptedClassifier {
    answer: Mutex<Option<(String, f32)>>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, label: &str, confidence: f32) {
        *self.answer.lock().unwrap() = Some((label.to_string(), confidence));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandmarkClassifier for ScriptedClassifier {
    fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answer
            .lock()
            .unwrap()
            .iter()
            .map(|(label, confidence)| Classification {
                label: label.clone(),
                confidence: *confidence,
            })
            .collect())
    }
}

/// Classifier that blocks inside `classify` until released
pub struct GatedClassifier {
    entered_tx: Mutex<std::sync::mpsc::Sender<()>>,
    release_rx: Mutex<std::sync::mpsc::Receiver<()>>,
    exited_tx: Mutex<std::sync::mpsc::Sender<()>>,
}

pub struct GatedControl {
    pub entered: std::sync::mpsc::Receiver<()>,
    pub release: std::sync::mpsc::Sender<()>,
    pub exited: std::sync::mpsc::Receiver<()>,
}

impl GatedClassifier {
    pub fn new() -> (Arc<Self>, GatedControl) {
        let (entered_tx, entered) = std::sync::mpsc::channel();
        let (release, release_rx) = std::sync::mpsc::channel();
        let (exited_tx, exited) = std::sync::mpsc::channel();
        (
            Arc::new(Self {
                entered_tx: Mutex::new(entered_tx),
                release_rx: Mutex::new(release_rx),
                exited_tx: Mutex::new(exited_tx),
            }),
            GatedControl {
                entered,
                release,
                exited,
            },
        )
    }
}

impl LandmarkClassifier for GatedClassifier {
    fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, InferenceError> {
        let _ = self.entered_tx.lock().unwrap().send(());
        let _ = self.release_rx.lock().unwrap().recv();
        let _ = self.exited_tx.lock().unwrap().send(());
        Ok(vec![Classification {
            label: "opernhaus".to_string(),
            confidence: 0.95,
        }])
    }
}

/// Block on a std channel without stalling the runtime
pub async fn recv_blocking(rx: std::sync::mpsc::Receiver<()>) -> std::sync::mpsc::Receiver<()> {
    tokio::task::spawn_blocking(move || {
        rx.recv_timeout(WAIT).expect("signal from classifier");
        rx
    })
    .await
    .unwrap()
}

/// Channel sensor that appends "<name>:start" / "<name>:stop" to a shared log
pub struct RecordingSensor<T> {
    inner: ChannelSensor<T>,
    log: Arc<Mutex<Vec<String>>>,
}

impl<T: Send> RecordingSensor<T> {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            inner: ChannelSensor::new(name, 16),
            log,
        })
    }

    pub fn push(&self, item: T) -> Result<(), SensorError> {
        self.inner.push(item)
    }
}

impl<T: Send> SensorFeed<T> for RecordingSensor<T> {
    fn start(&self) -> Result<mpsc::Receiver<T>, SensorError> {
        self.log.lock().unwrap().push(format!("{}:start", self.inner.name()));
        self.inner.start()
    }

    fn stop(&self) {
        self.log.lock().unwrap().push(format!("{}:stop", self.inner.name()));
        self.inner.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}

/// Weather source returning a fixed reading, or failing on demand
#[derive(Default)]
pub struct StubWeather {
    pub fail: std::sync::atomic::AtomicBool,
    calls: AtomicUsize,
}

impl StubWeather {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WeatherSource for StubWeather {
    fn current(&self, _location: GeoPoint) -> BoxFuture<'_, Result<Weather, WeatherError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(WeatherError::Status(503))
            } else {
                Ok(Weather {
                    temperature_c: 14.6,
                    wind_speed_kmh: 7.2,
                    weather_code: 0,
                    fetched_at: Utc::now(),
                })
            }
        }
        .boxed()
    }
}

pub fn label_map() -> LabelMap {
    LabelMap::new(HashMap::from([
        ("opernhaus".to_string(), OPERNHAUS_ID.to_string()),
        ("ghost".to_string(), "not-in-catalog".to_string()),
    ]))
}

/// Catalog client over a scripted transport, fast retries
pub fn scripted_client(transport: Arc<ScriptedTransport>) -> CatalogClient {
    CatalogClient::new(transport, RetryPolicy::default())
}

pub struct Harness {
    pub coordinator: ModeCoordinator,
    pub task: JoinHandle<()>,
    pub transport: Arc<ScriptedTransport>,
    pub camera: Arc<RecordingSensor<Frame>>,
    pub location: Arc<RecordingSensor<GeoPoint>>,
    pub weather: Arc<StubWeather>,
    pub log: Arc<Mutex<Vec<String>>>,
    pub events: broadcast::Receiver<ArEvent>,
}

impl Harness {
    /// Coordinator with the standard catalog, a scripted classifier and no throttling
    pub fn new(model: Arc<dyn LandmarkClassifier>, config: CoordinatorConfig) -> Self {
        let transport = ScriptedTransport::new();
        transport.script("landmarks", vec![Reply::ok(standard_landmarks_body())]);
        transport.script("categories", vec![Reply::ok(standard_categories_body())]);
        Self::with_transport(transport, model, config)
    }

    pub fn with_transport(
        transport: Arc<ScriptedTransport>,
        model: Arc<dyn LandmarkClassifier>,
        config: CoordinatorConfig,
    ) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let camera = RecordingSensor::new("camera", log.clone());
        let location = RecordingSensor::new("location", log.clone());
        let weather = Arc::new(StubWeather::default());
        let events = EventBus::new(256);
        let events_rx = events.subscribe();

        let gate = ClassificationGate::new(ModelHandle::Available(model), label_map())
            .with_min_interval(Duration::ZERO);

        let (coordinator, task) = ModeCoordinator::spawn(
            CoordinatorDeps {
                catalog: scripted_client(transport.clone()),
                gate: Arc::new(gate),
                camera: camera.clone(),
                location: location.clone(),
                weather: Some(weather.clone()),
                events,
            },
            config,
        );

        Self {
            coordinator,
            task,
            transport,
            camera,
            location,
            weather,
            log,
            events: events_rx,
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&CoordinatorState) -> bool) -> CoordinatorState {
        wait_for_state(self.coordinator.subscribe(), predicate).await
    }

    /// Start a session and wait for the catalog to be installed
    pub async fn start_with_catalog(&self) -> CoordinatorState {
        self.coordinator.start_session().await.unwrap();
        self.wait_for(|s| !s.catalog.is_empty()).await
    }

    /// Next event of the given type, skipping others
    pub async fn next_event(&mut self, event_type: &str) -> ArEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.expect("event bus open");
                if event.event_type() == event_type {
                    return event;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {event_type} event"))
    }

    /// Drain already-delivered events
    pub fn drain_events(&mut self) -> Vec<ArEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub async fn wait_for_state(
    mut rx: watch::Receiver<CoordinatorState>,
    predicate: impl FnMut(&CoordinatorState) -> bool,
) -> CoordinatorState {
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("state condition not reached in time")
        .expect("coordinator dropped")
        .clone();
    state
}

pub fn frame() -> Frame {
    Frame::new(2, 2, vec![0u8; 16])
}
