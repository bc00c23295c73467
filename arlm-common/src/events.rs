//! Event types for the ARLM event system
//!
//! Provides the coordinator's change notifications and the EventBus that
//! carries them to presentation layers (SSE, tests, loggers).

use crate::models::OperatingMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Coordinator event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every event carries the session generation it belongs to, so consumers
/// can ignore notifications from a session that has since been stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArEvent {
    /// AR session started; sensors for `mode` are live
    SessionStarted {
        generation: u64,
        mode: OperatingMode,
        timestamp: DateTime<Utc>,
    },

    /// AR session stopped; state was reset to defaults
    SessionStopped {
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Operating mode switched
    ModeChanged {
        generation: u64,
        old_mode: OperatingMode,
        new_mode: OperatingMode,
        timestamp: DateTime<Utc>,
    },

    /// A classifier result resolved to a catalog landmark
    LandmarkRecognized {
        generation: u64,
        landmark_id: String,
        label: String,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    /// The recognized landmark was cleared (timeout, unmapped label, mode change)
    RecognitionCleared {
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Nearby list recomputed from a location fix
    NearbyLandmarksUpdated {
        generation: u64,
        count: usize,
        /// Closest landmark, if any
        nearest_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A new catalog snapshot replaced the previous one
    CatalogLoaded {
        generation: u64,
        landmark_count: usize,
        category_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Catalog fetch failed after the client's own retries
    CatalogFailed {
        generation: u64,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Decorative weather snapshot refreshed
    WeatherUpdated {
        generation: u64,
        temperature_c: f64,
        timestamp: DateTime<Utc>,
    },
}

impl ArEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ArEvent::SessionStarted { .. } => "SessionStarted",
            ArEvent::SessionStopped { .. } => "SessionStopped",
            ArEvent::ModeChanged { .. } => "ModeChanged",
            ArEvent::LandmarkRecognized { .. } => "LandmarkRecognized",
            ArEvent::RecognitionCleared { .. } => "RecognitionCleared",
            ArEvent::NearbyLandmarksUpdated { .. } => "NearbyLandmarksUpdated",
            ArEvent::CatalogLoaded { .. } => "CatalogLoaded",
            ArEvent::CatalogFailed { .. } => "CatalogFailed",
            ArEvent::WeatherUpdated { .. } => "WeatherUpdated",
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            ArEvent::SessionStarted { generation, .. }
            | ArEvent::SessionStopped { generation, .. }
            | ArEvent::ModeChanged { generation, .. }
            | ArEvent::LandmarkRecognized { generation, .. }
            | ArEvent::RecognitionCleared { generation, .. }
            | ArEvent::NearbyLandmarksUpdated { generation, .. }
            | ArEvent::CatalogLoaded { generation, .. }
            | ArEvent::CatalogFailed { generation, .. }
            | ArEvent::WeatherUpdated { generation, .. } => *generation,
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the coordinator)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// ```
/// use arlm_common::events::{ArEvent, EventBus};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(ArEvent::SessionStopped {
///     generation: 2,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "SessionStopped");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ArEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ArEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ArEvent) -> Result<usize, broadcast::error::SendError<ArEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ArEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
