//! Coordinator-owned state and its read-only snapshot
//!
//! The actor mutates a single `CoordinatorState` and publishes a clone after
//! every change. Readers never see a half-applied update.

use crate::services::{ProximityEntry, Weather};
use arlm_common::models::{CatalogSnapshot, Landmark, OperatingMode};
use arlm_common::GeoPoint;
use serde::Serialize;
use std::sync::Arc;

/// Landmark resolved from an accepted classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedLandmark {
    pub landmark: Landmark,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct CoordinatorState {
    pub mode: OperatingMode,
    pub session_active: bool,
    /// Bumped on every session start and stop
    pub generation: u64,
    pub recognized: Option<RecognizedLandmark>,
    /// Ascending by distance, ties by identifier
    pub nearby: Vec<ProximityEntry>,
    pub last_location: Option<GeoPoint>,
    pub weather: Option<Weather>,
    pub catalog: Arc<CatalogSnapshot>,
    /// Last catalog failure, phrased for the user
    pub catalog_error: Option<String>,
}

impl CoordinatorState {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            session_active: false,
            generation: 0,
            recognized: None,
            nearby: Vec::new(),
            last_location: None,
            weather: None,
            catalog: Arc::new(CatalogSnapshot::empty()),
            catalog_error: None,
        }
    }

    pub fn recognized_id(&self) -> Option<&str> {
        self.recognized.as_ref().map(|r| r.landmark.id.as_str())
    }

    pub fn nearby_ids(&self) -> Vec<&str> {
        self.nearby.iter().map(|e| e.landmark.id.as_str()).collect()
    }

    /// What the presentation layer should show for the active mode
    pub fn displayed_landmarks(&self) -> Vec<&Landmark> {
        match self.mode {
            OperatingMode::VisualRecognition => {
                self.recognized.iter().map(|r| &r.landmark).collect()
            }
            OperatingMode::GeoBased => self.nearby.iter().map(|e| &e.landmark).collect(),
        }
    }

    /// Session teardown: keep the mode and the loaded catalog, drop all
    /// sensor-derived values.
    pub(crate) fn reset_session(&mut self) {
        self.session_active = false;
        self.recognized = None;
        self.nearby.clear();
        self.last_location = None;
        self.weather = None;
        self.catalog_error = None;
    }
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new(OperatingMode::default())
    }
}
