//! HTTP transport for the catalog client
//!
//! The retry loop only needs "send one GET, give me status + body". Keeping
//! that behind [`CatalogTransport`] lets tests script exact response
//! sequences without a live backend.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("ARLM/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One catalog query: `{base}/rest/v1/{path}?{query}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub path: String,
    pub query: String,
}

impl CatalogRequest {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
        }
    }
}

/// Status and raw body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The request never produced an HTTP status (DNS, connect, timeout, reset)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends a single catalog GET
pub trait CatalogTransport: Send + Sync {
    fn get<'a>(
        &'a self,
        request: &'a CatalogRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url_for(&self, request: &CatalogRequest) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, request.path, request.query)
    }
}

impl CatalogTransport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        request: &'a CatalogRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        async move {
            let url = self.url_for(request);
            tracing::debug!(url = %url, "Querying catalog backend");

            let response = self
                .http_client
                .get(&url)
                .header("apikey", &self.api_key)
                .header("Content-Type", "application/json")
                .header("Prefer", "return=representation")
                .send()
                .await
                .map_err(|e| TransportError(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError(e.to_string()))?;

            Ok(RawResponse {
                status,
                body: body.to_vec(),
            })
        }
        .boxed()
    }
}
