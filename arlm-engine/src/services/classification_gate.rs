//! Throttled on-device classification
//!
//! Wraps a blocking image classifier so a continuous camera stream costs at
//! most one inference per `min_interval`:
//! - calls inside the interval return `None` without touching the model
//! - a call while an inference is running returns `None` (no queueing)
//! - an unavailable model makes every call return `None`
//! - the top label is accepted only above the confidence threshold
//!
//! Inference itself runs on tokio's blocking pool.

use super::label_map::LabelMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;

/// One camera frame, already converted to the model's pixel layout
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }
}

/// One ranked classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Inference failed: {0}")]
    Failed(String),
}

/// Blocking image classifier. Returns classifications ranked best-first.
pub trait LandmarkClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, InferenceError>;
}

/// Whether an inference backend is loaded
#[derive(Clone)]
pub enum ModelHandle {
    Available(Arc<dyn LandmarkClassifier>),
    Unavailable,
}

impl ModelHandle {
    pub fn is_available(&self) -> bool {
        matches!(self, ModelHandle::Available(_))
    }
}

/// Accepted classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub label: String,
    pub confidence: f32,
    /// `None` when the label is not in the label map
    pub landmark_id: Option<String>,
}

impl RecognitionResult {
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0) as u8
    }
}

/// Latest accepted (label, confidence), published as one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateReading {
    pub label: String,
    pub confidence: f32,
}

/// Resets the in-flight flag when the inference finishes (or is dropped)
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ClassificationGate {
    model: ModelHandle,
    labels: LabelMap,
    min_interval: Duration,
    confidence_threshold: f32,
    last_invocation: Mutex<Option<Instant>>,
    in_flight: Arc<AtomicBool>,
    reading_tx: watch::Sender<Option<GateReading>>,
}

impl ClassificationGate {
    pub fn new(model: ModelHandle, labels: LabelMap) -> Self {
        if !model.is_available() {
            info!("Vision model not loaded; visual recognition disabled");
        }
        let (reading_tx, _) = watch::channel(None);
        Self {
            model,
            labels,
            min_interval: DEFAULT_MIN_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            last_invocation: Mutex::new(None),
            in_flight: Arc::new(AtomicBool::new(false)),
            reading_tx,
        }
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Latest published reading
    pub fn reading(&self) -> Option<GateReading> {
        self.reading_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GateReading>> {
        self.reading_tx.subscribe()
    }

    /// Classify one frame, or `None` if throttled, busy, unavailable, failed
    /// or below the confidence threshold.
    pub async fn classify(&self, frame: Frame) -> Option<RecognitionResult> {
        let ModelHandle::Available(model) = &self.model else {
            trace!("Frame dropped: model unavailable");
            return None;
        };

        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            trace!("Frame dropped: inference already in flight");
            return None;
        };

        if !self.claim_slot() {
            trace!("Frame dropped: inside throttle interval");
            return None;
        }

        let model = Arc::clone(model);
        let outcome = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            model.classify(&frame)
        })
        .await;

        let classifications = match outcome {
            Ok(Ok(classifications)) => classifications,
            Ok(Err(e)) => {
                debug!(error = %e, "Classification failed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Classification task aborted");
                return None;
            }
        };

        let accepted = classifications
            .into_iter()
            .next()
            .filter(|top| top.confidence > self.confidence_threshold);

        let Some(top) = accepted else {
            self.reading_tx.send_replace(None);
            return None;
        };

        let confidence = top.confidence.clamp(0.0, 1.0);
        let landmark_id = self.labels.lookup(&top.label);
        debug!(
            label = %top.label,
            confidence,
            mapped = landmark_id.is_some(),
            "Classification accepted"
        );

        self.reading_tx.send_replace(Some(GateReading {
            label: top.label.clone(),
            confidence,
        }));

        Some(RecognitionResult {
            label: top.label,
            confidence,
            landmark_id,
        })
    }

    /// Record an invocation if the throttle interval has passed
    fn claim_slot(&self) -> bool {
        let mut last = self.last_invocation.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.min_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }
}
