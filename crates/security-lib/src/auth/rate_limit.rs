// ============================
// crates/security-lib/src/auth/rate_limit.rs
// ============================
//! Fixed-window rate limiting with an optional extended block.
//!
//! Two independent instances are used: `login` (keyed by email and IP) and
//! `api` (keyed by whatever the caller throttles on).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use crate::clock::{remaining, span, SharedClock};
use crate::config::RateLimitSettings;
use crate::metrics::RATE_LIMITED;

/// Outcome of one [`RateLimiter::consume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Points left in the current window
    pub remaining: u32,
    /// Time before the next point becomes available; zero when allowed
    pub retry_after: Duration,
}

/// Rate limit entry for a key
#[derive(Debug, Clone)]
struct RateLimitBucket {
    remaining_points: u32,
    window_start: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Rate limiter for one kind of operation
#[derive(Debug, Clone)]
pub struct RateLimiter {
    name: &'static str,
    buckets: Arc<DashMap<String, RateLimitBucket>>,
    settings: RateLimitSettings,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(name: &'static str, settings: RateLimitSettings, clock: SharedClock) -> Self {
        Self {
            name,
            buckets: Arc::new(DashMap::new()),
            settings,
            clock,
        }
    }

    /// Login limiter: 5 points per 15 minutes, then blocked for 30
    pub fn login(settings: RateLimitSettings, clock: SharedClock) -> Self {
        Self::new("login", settings, clock)
    }

    /// API limiter: 100 points per minute
    pub fn api(settings: RateLimitSettings, clock: SharedClock) -> Self {
        Self::new("api", settings, clock)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Take one point for `key`
    pub fn consume(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let window = span(self.settings.window());

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket {
                remaining_points: self.settings.points,
                window_start: now,
                blocked_until: None,
            });

        match bucket.blocked_until {
            Some(until) if now < until => {
                drop(bucket);
                return self.rejected(key, remaining(until, now));
            },
            Some(_) => {
                bucket.remaining_points = self.settings.points;
                bucket.window_start = now;
                bucket.blocked_until = None;
            },
            None => {},
        }

        // Check if window has expired
        if now - bucket.window_start >= window {
            bucket.remaining_points = self.settings.points;
            bucket.window_start = now;
        }

        if bucket.remaining_points > 0 {
            bucket.remaining_points -= 1;
            return RateLimitDecision {
                allowed: true,
                remaining: bucket.remaining_points,
                retry_after: Duration::ZERO,
            };
        }

        let retry_after = match self.settings.block() {
            Some(block) => {
                bucket.blocked_until = Some(now + span(block));
                block
            },
            None => remaining(bucket.window_start + window, now),
        };
        drop(bucket);

        self.rejected(key, retry_after)
    }

    fn rejected(&self, key: &str, retry_after: Duration) -> RateLimitDecision {
        debug!(limiter = self.name, key, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
        counter!(RATE_LIMITED, "limiter" => self.name).increment(1);
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            retry_after,
        }
    }

    /// Forget everything about `key`, including an active block
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// Drop buckets whose window and block have both run out
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let window = span(self.settings.window());
        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| match bucket.blocked_until {
            Some(until) => now < until,
            None => now - bucket.window_start < window,
        });

        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
