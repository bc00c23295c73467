//! Sensor ingress: the host app pushes location fixes and camera frames

use crate::error::{ApiError, ApiResult};
use crate::services::{Frame, SensorError};
use crate::AppState;
use arlm_common::GeoPoint;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Bytes per pixel of pushed frames (RGBA8)
pub const FRAME_BYTES_PER_PIXEL: usize = 4;

pub const DEFAULT_MAX_FRAME_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_FRAME_HEIGHT: u32 = 1080;

/// Largest frame `/frame` accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl FrameLimits {
    /// Body size of a maximal RGBA frame
    pub fn max_bytes(&self) -> usize {
        (self.max_width as usize)
            .saturating_mul(self.max_height as usize)
            .saturating_mul(FRAME_BYTES_PER_PIXEL)
    }

    fn allows(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_FRAME_WIDTH,
            max_height: DEFAULT_MAX_FRAME_HEIGHT,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// False when the reading was dropped because the feed is saturated
    pub accepted: bool,
}

fn ingest(result: Result<(), SensorError>) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    match result {
        Ok(()) => Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted: true }))),
        Err(SensorError::Saturated(_)) => {
            Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted: false })))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /location
pub async fn push_location(
    State(state): State<AppState>,
    Json(fix): Json<GeoPoint>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    if !fix.is_valid() {
        return Err(ApiError::BadRequest(format!(
            "coordinates out of range: {}, {}",
            fix.latitude, fix.longitude
        )));
    }
    ingest(state.location.push(fix))
}

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    pub width: u32,
    pub height: u32,
}

/// POST /frame?width=&height=
///
/// Body is raw RGBA8 pixel data, row-major, at most
/// [`FrameLimits`] in either dimension.
pub async fn push_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let limits = state.frame_limits;
    if !limits.allows(query.width, query.height) {
        return Err(ApiError::BadRequest(format!(
            "frame {}x{} exceeds the {}x{} maximum",
            query.width, query.height, limits.max_width, limits.max_height
        )));
    }

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!(
                "frame body over {} bytes",
                limits.max_bytes()
            ))
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    let expected = (query.width as usize)
        .checked_mul(query.height as usize)
        .and_then(|pixels| pixels.checked_mul(FRAME_BYTES_PER_PIXEL))
        .filter(|len| *len > 0)
        .ok_or_else(|| ApiError::BadRequest("frame dimensions must be non-zero".to_string()))?;

    if body.len() != expected {
        return Err(ApiError::BadRequest(format!(
            "frame body is {} bytes, expected {} for {}x{} RGBA",
            body.len(),
            expected,
            query.width,
            query.height
        )));
    }

    let frame = Frame::new(query.width, query.height, body.to_vec());
    ingest(state.camera.push(frame))
}

pub fn sensor_routes(limits: FrameLimits) -> Router<AppState> {
    Router::new().route("/location", post(push_location)).route(
        "/frame",
        post(push_frame).layer(DefaultBodyLimit::max(limits.max_bytes())),
    )
}
