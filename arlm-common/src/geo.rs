//! Geodesic helpers
//!
//! Great-circle distance on a spherical Earth (haversine). Accuracy is well
//! within what a phone GPS fix delivers at city scale.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude within -90..=90 and longitude within -180..=180, both finite
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_m(self, other)
    }
}

/// Haversine distance between two points in meters.
///
/// The operands are put in a canonical order before evaluation so the result
/// is bit-identical regardless of argument order.
pub fn distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (p, q) = if (a.latitude, a.longitude) <= (b.latitude, b.longitude) {
        (a, b)
    } else {
        (b, a)
    };

    let lat1 = p.latitude.to_radians();
    let lat2 = q.latitude.to_radians();
    let delta_lat = (q.latitude - p.latitude).to_radians();
    let delta_lon = (q.longitude - p.longitude).to_radians();

    let sin_dlat = (delta_lat / 2.0).sin();
    let sin_dlon = (delta_lon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    // Rounding can push h a hair above 1.0 for antipodal points
    let c = 2.0 * h.min(1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}
