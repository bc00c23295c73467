//! Landmarks near a device location
//!
//! Stateless: every call computes haversine distances from scratch and
//! returns the landmarks inside the radius, closest first.

use arlm_common::geo::distance_m;
use arlm_common::models::Landmark;
use arlm_common::GeoPoint;
use serde::Serialize;

/// Default search radius
pub const DEFAULT_RADIUS_M: f64 = 500.0;

/// A landmark with its distance from the query point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityEntry {
    pub landmark: Landmark,
    pub distance_m: f64,
}

impl ProximityEntry {
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_m)
    }
}

/// Landmarks within `radius_m` of `location`, ascending by distance with
/// ties broken by identifier.
///
/// Landmarks with invalid coordinates are skipped. A non-finite or negative
/// radius yields an empty list.
pub fn nearby<'a, I>(location: GeoPoint, landmarks: I, radius_m: f64) -> Vec<ProximityEntry>
where
    I: IntoIterator<Item = &'a Landmark>,
{
    if !radius_m.is_finite() || radius_m < 0.0 || !location.is_valid() {
        return Vec::new();
    }

    let mut entries: Vec<ProximityEntry> = landmarks
        .into_iter()
        .filter(|l| l.location().is_valid())
        .filter_map(|l| {
            let distance = distance_m(&location, &l.location());
            (distance <= radius_m).then(|| ProximityEntry {
                landmark: l.clone(),
                distance_m: distance,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| a.landmark.id.cmp(&b.landmark.id))
    });
    entries
}

/// "420 m" below one kilometer, "1.3 km" above
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}
