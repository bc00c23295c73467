//! Server-Sent Events stream of coordinator events

use super::session::StateResponse;
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events
///
/// Opens with a `state` event carrying the current [`StateResponse`], then
/// streams every [`ArEvent`](arlm_common::events::ArEvent) as JSON with the
/// event type as the SSE `event:` name. The stream ends when
/// [`AppState::shutdown`] is cancelled.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    // Subscribe first so nothing between the snapshot and the stream is lost
    let mut rx = state.coordinator.events().subscribe();
    let shutdown = state.shutdown.clone();
    let snapshot = serde_json::to_string(&StateResponse::from(&state.coordinator.current()));

    let stream = async_stream::stream! {
        match snapshot {
            Ok(json) => yield Ok(Event::default().event("state").data(json)),
            Err(e) => warn!(error = %e, "SSE: Failed to serialize state snapshot"),
        }

        loop {
            tokio::select! {
                // Graceful shutdown waits for open responses; end ours
                _ = shutdown.cancelled() => {
                    debug!("SSE: Server shutting down, closing stream");
                    break;
                }

                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => match received {
                    Ok(event) => {
                        let event_type = event.event_type();
                        match serde_json::to_string(&event) {
                            Ok(event_json) => {
                                yield Ok(Event::default().event(event_type).data(event_json));
                            }
                            Err(e) => {
                                warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "SSE: Client lagging, events skipped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("SSE: Event bus closed");
                        break;
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
