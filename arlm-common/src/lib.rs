//! # ARLM Common Library
//!
//! Shared code for the AR landmarks engine:
//! - Catalog data model (landmarks, categories, photos, snapshots)
//! - Geodesic helpers (great-circle distance)
//! - Event types and the broadcast EventBus
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod models;

pub use error::{Error, Result};
pub use geo::GeoPoint;
