//! Catalog backend client
//!
//! Fetches landmarks, categories and photos from the PostgREST-style catalog
//! backend. Every call runs its own sequential retry loop (see [`retry`]) and
//! returns either the fully decoded collection or one typed error.
//!
//! Requests are cancellable through a [`CancellationToken`]; cancellation
//! wins over an in-flight request and over a pending backoff sleep.

pub mod retry;
pub mod transport;

pub use retry::RetryPolicy;
pub use transport::{CatalogRequest, CatalogTransport, RawResponse, ReqwestTransport, TransportError};

use arlm_common::models::{CatalogSnapshot, Category, Landmark, LandmarkPhoto};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LANDMARKS_QUERY: &str = "select=*,category:categories(*)&is_active=eq.true&order=name.asc";
const CATEGORIES_QUERY: &str = "select=*&order=sort_order.asc";

/// Catalog client errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// Transport failure, no HTTP status received (transient)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429 (transient)
    #[error("Rate limited by catalog backend")]
    RateLimited,

    /// HTTP 5xx (transient)
    #[error("Catalog backend error (HTTP {status})")]
    Server { status: u16 },

    /// HTTP 401/403
    #[error("Unauthorized (HTTP {status}) - please check the catalog API key")]
    Auth { status: u16 },

    /// HTTP 404
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 2xx body did not match the expected schema
    #[error("Data decoding error: {0}")]
    Decode(String),

    /// Any other unexpected status
    #[error("Unexpected HTTP status {status}")]
    Http { status: u16 },

    /// Request could not be built (bad identifier, bad client setup)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller cancelled the request
    #[error("Request was cancelled")]
    Cancelled,
}

impl CatalogError {
    /// Transient errors the retry loop may try again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Network(_) | CatalogError::RateLimited | CatalogError::Server { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CatalogError::Cancelled)
    }

    /// Message suitable for the presentation layer; `None` for cancellation,
    /// which is never shown to the user.
    pub fn user_message(&self) -> Option<String> {
        match self {
            CatalogError::Cancelled => None,
            CatalogError::Network(_) | CatalogError::Server { .. } => {
                Some("Landmarks could not be loaded. Check your connection and try again.".to_string())
            }
            CatalogError::RateLimited => {
                Some("The landmark service is busy. Please try again shortly.".to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

/// Map an HTTP status to the body (2xx) or the matching error
fn classify_response(response: RawResponse, request: &CatalogRequest) -> Result<Vec<u8>, CatalogError> {
    match response.status {
        200..=299 => Ok(response.body),
        401 | 403 => Err(CatalogError::Auth {
            status: response.status,
        }),
        404 => Err(CatalogError::NotFound(request.path.clone())),
        429 => Err(CatalogError::RateLimited),
        500..=599 => Err(CatalogError::Server {
            status: response.status,
        }),
        status => Err(CatalogError::Http { status }),
    }
}

/// Catalog API client
///
/// Cheap to clone; constructed once and handed to every consumer.
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn CatalogTransport>,
    policy: RetryPolicy,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn CatalogTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Client talking to a real backend over HTTPS
    pub fn connect(base_url: &str, api_key: &str, policy: RetryPolicy) -> Result<Self, CatalogError> {
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(CatalogError::InvalidRequest(
                "catalog base URL and API key must be configured".to_string(),
            ));
        }
        let transport = ReqwestTransport::new(base_url, api_key)
            .map_err(|e| CatalogError::InvalidRequest(e.to_string()))?;
        Ok(Self::new(Arc::new(transport), policy))
    }

    /// Active landmarks with their joined category, ordered by name
    pub async fn fetch_landmarks(&self, cancel: &CancellationToken) -> Result<Vec<Landmark>, CatalogError> {
        self.fetch(CatalogRequest::new("landmarks", LANDMARKS_QUERY), cancel)
            .await
    }

    /// All categories ordered by `sort_order`
    pub async fn fetch_categories(&self, cancel: &CancellationToken) -> Result<Vec<Category>, CatalogError> {
        self.fetch(CatalogRequest::new("categories", CATEGORIES_QUERY), cancel)
            .await
    }

    /// Photos of one landmark in display order
    pub async fn fetch_photos(
        &self,
        landmark_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LandmarkPhoto>, CatalogError> {
        if landmark_id.is_empty()
            || !landmark_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CatalogError::InvalidRequest(format!(
                "invalid landmark id: {landmark_id:?}"
            )));
        }

        let query = format!("select=*&landmark_id=eq.{landmark_id}&order=sort_order.asc");
        self.fetch(CatalogRequest::new("landmark_photos", query), cancel)
            .await
    }

    /// Landmarks and categories fetched concurrently and assembled into a
    /// snapshot. Either failure fails the whole snapshot.
    pub async fn fetch_snapshot(&self, cancel: &CancellationToken) -> Result<CatalogSnapshot, CatalogError> {
        let (landmarks, categories) =
            tokio::try_join!(self.fetch_landmarks(cancel), self.fetch_categories(cancel))?;

        let snapshot = CatalogSnapshot::new(landmarks, categories, chrono::Utc::now());
        info!(
            landmarks = snapshot.len(),
            categories = snapshot.categories().len(),
            "Catalog snapshot fetched"
        );
        Ok(snapshot)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: CatalogRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, CatalogError> {
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }

            debug!(path = %request.path, attempt, "Catalog request");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
                result = self.transport.get(&request) => result,
            };

            let error = match outcome {
                Ok(response) => {
                    debug!(path = %request.path, status = response.status, "Catalog response");
                    match classify_response(response, &request) {
                        Ok(body) => {
                            return serde_json::from_slice::<Vec<T>>(&body)
                                .map_err(|e| CatalogError::Decode(e.to_string()));
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => CatalogError::Network(e.to_string()),
            };

            let Some(delay) = self.policy.delay_for(&error, attempt) else {
                if error.is_transient() {
                    warn!(
                        path = %request.path,
                        attempts = attempt + 1,
                        error = %error,
                        "Catalog request failed: retries exhausted"
                    );
                }
                return Err(error);
            };

            warn!(
                path = %request.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Catalog request failed, will retry after backoff"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
