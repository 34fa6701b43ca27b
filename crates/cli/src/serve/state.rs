//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;
use crate::seed::MemoryEngine;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory fixed-window rate limiter keyed by client IP.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// `Err(retry_after_secs)` once `ip` exceeds the window's budget.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;

        // Drop clients whose window has expired.
        tracker.retain(|_, (_, start)| {
            now.saturating_duration_since(*start).as_secs() < RATE_LIMIT_WINDOW_SECS
        });

        let entry = tracker.entry(ip).or_insert((0, now));

        entry.0 += 1;
        if entry.0 > self.max_requests {
            let elapsed = now.saturating_duration_since(entry.1).as_secs();
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed).max(1))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.tracker.lock().await.len()
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) engine: MemoryEngine,
    pub(crate) rate_limiter: RateLimiter,
    /// Client API key. None = no auth required.
    pub(crate) api_key: Option<String>,
    /// Admin key, presented in `X-Admin-Key`. None = no admin deletes.
    pub(crate) admin_api_key: Option<String>,
}

impl AppState {
    pub(crate) fn is_admin(&self, presented: Option<&str>) -> bool {
        match (&self.admin_api_key, presented) {
            (Some(expected), Some(got)) => keys_match(expected, got),
            _ => false,
        }
    }
}

/// Constant-time key comparison.
pub(crate) fn keys_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
