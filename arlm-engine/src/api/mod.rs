//! HTTP API handlers
//!
//! REST + SSE surface a presentation layer uses to drive and observe the
//! coordinator.

pub mod catalog;
pub mod health;
pub mod labels;
pub mod sensors;
pub mod session;
pub mod sse;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use labels::label_routes;
pub use sensors::sensor_routes;
pub use session::session_routes;
pub use sse::event_stream;
