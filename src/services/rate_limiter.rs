//! Fixed-window rate limiter keyed by API key.
//!
//! Each key gets a counter and a reset instant. The first request after the reset
//! instant opens a new window. Bursts straddling a window boundary can reach twice
//! the limit; that is the accepted cost of the fixed-window scheme.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Counter state for one key.
#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a single [`RateLimiter::allow`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Denied { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<Uuid, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key_id` against `limit` per `window`.
    pub fn allow(&self, key_id: Uuid, limit: u32, window: Duration) -> RateLimitDecision {
        self.allow_at(key_id, limit, window, Instant::now())
    }

    /// [`Self::allow`] with an explicit clock reading.
    ///
    /// The entry guard holds the shard lock for the whole read-increment-compare,
    /// so concurrent calls for the same key are serialized.
    pub fn allow_at(
        &self,
        key_id: Uuid,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entry = self.windows.entry(key_id).or_insert(RateLimitWindow {
            count: 0,
            reset_at: now + window,
        });

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > limit {
            let remaining = entry.reset_at.saturating_duration_since(now);
            RateLimitDecision::Denied {
                retry_after_secs: retry_after_secs(remaining),
            }
        } else {
            RateLimitDecision::Allowed {
                remaining: limit - entry.count,
            }
        }
    }

    /// Drop windows whose reset instant has passed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at >= now);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Whole seconds until reset, rounded up, never below one.
fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}
