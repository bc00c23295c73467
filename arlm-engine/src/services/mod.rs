//! Engine services: catalog access, classification, proximity, weather and
//! sensor feeds

pub mod catalog_client;
pub mod classification_gate;
pub mod label_map;
pub mod proximity_index;
pub mod sensors;
pub mod weather_client;

pub use catalog_client::{CatalogClient, CatalogError, RetryPolicy};
pub use classification_gate::{ClassificationGate, Frame, ModelHandle, RecognitionResult};
pub use label_map::LabelMap;
pub use proximity_index::ProximityEntry;
pub use sensors::{ChannelSensor, SensorError, SensorFeed};
pub use weather_client::{Weather, WeatherSource};
