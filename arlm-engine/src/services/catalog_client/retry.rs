//! Backoff policy for catalog requests
//!
//! Delay depends on what went wrong:
//! - 429: `rate_limit_base * 2^attempt` (1s, 2s, 4s, ...)
//! - 5xx: `server_error_base * 2^attempt` (0.5s, 1s, 2s, ...)
//! - transport failure: fixed `network_delay`
//!
//! `attempt` is 0-indexed. The last allowed attempt never sleeps; its error
//! is returned as-is.

use super::CatalogError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    pub rate_limit_base_ms: u64,
    pub server_error_base_ms: u64,
    pub network_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base_ms: 1000,
            server_error_base_ms: 500,
            network_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Attempts actually made per call (at least one)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retrying after `error` on 0-indexed `attempt`, or `None`
    /// when the error is final (not retryable, or no attempts left).
    pub fn delay_for(&self, error: &CatalogError, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.attempts() {
            return None;
        }

        let ms = match error {
            CatalogError::RateLimited => exponential(self.rate_limit_base_ms, attempt),
            CatalogError::Server { .. } => exponential(self.server_error_base_ms, attempt),
            CatalogError::Network(_) => self.network_delay_ms,
            _ => return None,
        };

        Some(Duration::from_millis(ms))
    }
}

fn exponential(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
}
