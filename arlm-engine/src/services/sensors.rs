//! Sensor feeds
//!
//! The coordinator sees camera frames and location fixes as a
//! [`SensorFeed`]: `start` hands out a fresh receiver, `stop` ends the
//! stream. A feed that was stopped never delivers into a receiver handed out
//! earlier, so a restarted feed cannot replay old items.

use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default per-feed buffer
pub const DEFAULT_FEED_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum SensorError {
    #[error("Sensor {0} is not running")]
    NotRunning(&'static str),

    #[error("Sensor {0} is saturated; item dropped")]
    Saturated(&'static str),

    #[error("Sensor {0} failed to start: {1}")]
    StartFailed(&'static str, String),
}

/// Start/stop source of sensor readings
pub trait SensorFeed<T>: Send + Sync {
    /// Begin delivering readings; replaces any previous receiver
    fn start(&self) -> Result<mpsc::Receiver<T>, SensorError>;

    /// Stop delivering; idempotent
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Feed whose readings are pushed in by the host (HTTP handler, test, ...)
pub struct ChannelSensor<T> {
    name: &'static str,
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<T>>>,
}

impl<T: Send> ChannelSensor<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            sender: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Deliver one reading to the running feed.
    ///
    /// Never blocks: a full buffer drops the reading (frames and fixes are
    /// superseded by the next one anyway).
    pub fn push(&self, item: T) -> Result<(), SensorError> {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = guard.as_ref() else {
            return Err(SensorError::NotRunning(self.name));
        };

        sender.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                trace!(sensor = self.name, "Sensor buffer full, dropping reading");
                SensorError::Saturated(self.name)
            }
            mpsc::error::TrySendError::Closed(_) => SensorError::NotRunning(self.name),
        })
    }
}

impl<T: Send> SensorFeed<T> for ChannelSensor<T> {
    fn start(&self) -> Result<mpsc::Receiver<T>, SensorError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        *self.sender.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        debug!(sensor = self.name, "Sensor started");
        Ok(rx)
    }

    fn stop(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            debug!(sensor = self.name, "Sensor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }
}
