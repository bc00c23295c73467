//! Catalog data model
//!
//! Wire records decode straight from the backend's snake_case JSON; the
//! [`CatalogSnapshot`] is the immutable, validated view the engine works on.

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Which signal source drives landmark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Camera frames through the on-device classifier
    #[default]
    VisualRecognition,
    /// Device location against the catalog
    GeoBased,
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::VisualRecognition => write!(f, "VisualRecognition"),
            OperatingMode::GeoBased => write!(f, "GeoBased"),
        }
    }
}

/// Landmark category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub name_en: Option<String>,
    /// Emoji or icon name shown next to the category
    pub icon: Option<String>,
    /// Hex color, e.g. "#3B82F6"
    pub color: String,
    pub sort_order: i32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Landmark record as delivered by the catalog backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Stable identifier (UUID text)
    pub id: String,
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
    pub zurich_tourism_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website_url: Option<String>,
    pub opening_hours: Option<String>,
    pub api_source: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Joined category row (`category:categories(*)`)
    pub category: Option<Category>,
}

fn default_active() -> bool {
    true
}

impl Landmark {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Name in the requested language, falling back to the primary name
    pub fn localized_name(&self, english: bool) -> &str {
        match (&self.name_en, english) {
            (Some(en), true) if !en.trim().is_empty() => en,
            _ => &self.name,
        }
    }

    /// True if any contact channel (phone, email, website) is present
    pub fn has_contact_info(&self) -> bool {
        self.phone.is_some() || self.email.is_some() || self.website_url.is_some()
    }

    /// Opening hours with `;` and `|` separators turned into line breaks
    pub fn formatted_opening_hours(&self) -> Option<String> {
        self.opening_hours.as_deref().map(format_opening_hours)
    }
}

/// Turn the backend's `;`/`|` separated opening hours into one entry per line
pub fn format_opening_hours(hours: &str) -> String {
    hours.replace([';', '|'], "\n")
}

/// Photo attached to a landmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPhoto {
    pub id: String,
    pub landmark_id: String,
    pub photo_url: String,
    pub caption: Option<String>,
    pub caption_en: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_primary: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Category imported when the sync endpoint is called without one
pub const DEFAULT_SYNC_CATEGORY_ID: u32 = 72;

/// Response of the backend's POI sync endpoint
///
/// The engine never calls the endpoint; the type documents the contract the
/// catalog is populated through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub count: u32,
    pub total: u32,
    #[serde(default)]
    pub results: Vec<SyncItemResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItemResult {
    pub success: bool,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable point-in-time copy of the landmark/category set
///
/// Built once per successful fetch and shared behind an `Arc`; a refresh
/// replaces the whole value.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    landmarks: BTreeMap<String, Landmark>,
    categories: Vec<Category>,
    fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Build a snapshot from freshly decoded records.
    ///
    /// Inactive records and records with out-of-range coordinates are
    /// dropped. A repeated identifier keeps the first occurrence.
    pub fn new(
        landmarks: Vec<Landmark>,
        mut categories: Vec<Category>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mut by_id = BTreeMap::new();

        for landmark in landmarks {
            if !landmark.is_active {
                debug!(id = %landmark.id, "Skipping inactive landmark");
                continue;
            }
            if !landmark.location().is_valid() {
                warn!(
                    id = %landmark.id,
                    latitude = landmark.latitude,
                    longitude = landmark.longitude,
                    "Dropping landmark with invalid coordinates"
                );
                continue;
            }
            if by_id.contains_key(&landmark.id) {
                warn!(id = %landmark.id, "Duplicate landmark identifier, keeping first record");
                continue;
            }
            by_id.insert(landmark.id.clone(), landmark);
        }

        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));

        Self {
            landmarks: by_id,
            categories,
            fetched_at,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Utc::now())
    }

    pub fn get(&self, id: &str) -> Option<&Landmark> {
        self.landmarks.get(id)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// All landmarks, ordered by identifier
    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// Categories ordered by `sort_order`
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Landmarks ordered by display name (then id), the catalog list order
    pub fn sorted_by_name(&self) -> Vec<&Landmark> {
        let mut list: Vec<&Landmark> = self.landmarks.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Landmarks whose category is in `selected`; an empty selection means all
    pub fn filter_by_categories(&self, selected: &HashSet<String>) -> Vec<&Landmark> {
        self.sorted_by_name()
            .into_iter()
            .filter(|l| {
                selected.is_empty()
                    || l.category_id
                        .as_ref()
                        .is_some_and(|id| selected.contains(id))
            })
            .collect()
    }
}
