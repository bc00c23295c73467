//! Scripted catalog transport
//!
//! Replies are queued per path; the last reply of a queue repeats. Every
//! request is recorded with the (tokio) time it was made so backoff delays
//! can be asserted under a paused clock.

use arlm_engine::services::catalog_client::{CatalogRequest, CatalogTransport, RawResponse, TransportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Network(String),
    /// Never completes
    Hang,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }

    pub fn network(message: &str) -> Self {
        Reply::Network(message.to_string())
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(CatalogRequest, Instant)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the reply queue for `path`
    pub fn script(&self, path: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), replies.into());
    }

    pub fn requests(&self) -> Vec<CatalogRequest> {
        self.requests.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.call_times(path).len()
    }

    pub fn call_times(&self, path: &str) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.path == path)
            .map(|(_, at)| *at)
            .collect()
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::ok("[]")),
            None => Reply::ok("[]"),
        }
    }
}

impl CatalogTransport for ScriptedTransport {
    fn get<'a>(&'a self, request: &'a CatalogRequest) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));
        let reply = self.next_reply(&request.path);

        async move {
            match reply {
                Reply::Status(status, body) => Ok(RawResponse {
                    status,
                    body: body.into_bytes(),
                }),
                Reply::Network(message) => Err(TransportError(message)),
                Reply::Hang => std::future::pending().await,
            }
        }
        .boxed()
    }
}
