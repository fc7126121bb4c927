// ============================
// crates/security-lib/src/auth/lockout.rs
// ============================
//! Brute-force lockout for authentication attempts.
//!
//! Failure streaks are counted per key (the normalised email). Reaching the
//! threshold locks the key for a fixed duration; a successful login removes
//! the record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use crate::clock::{remaining, span, SharedClock};
use crate::config::LockoutSettings;
use crate::events::{SecurityEvent, SecurityEvents};
use crate::metrics::LOCKOUT_ENGAGED;

/// Entry in the lockout map
#[derive(Debug, Clone)]
struct FailedAttemptRecord {
    /// Number of failed attempts in the current streak
    count: u32,
    /// Time of the last failed attempt
    last_failure: DateTime<Utc>,
    /// When the lockout expires, if one is active
    lockout_until: Option<DateTime<Utc>>,
}

/// Result of a lockout check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub is_locked: bool,
    pub remaining: Duration,
}

impl LockoutStatus {
    fn open() -> Self {
        Self {
            is_locked: false,
            remaining: Duration::ZERO,
        }
    }
}

/// Lockout guard for authentication attempts
#[derive(Debug, Clone)]
pub struct LockoutGuard {
    /// Map of keys to failure records
    attempts: Arc<DashMap<String, FailedAttemptRecord>>,
    settings: LockoutSettings,
    clock: SharedClock,
    events: SecurityEvents,
}

impl LockoutGuard {
    /// Create a new lockout guard
    pub fn new(settings: LockoutSettings, clock: SharedClock, events: SecurityEvents) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            settings,
            clock,
            events,
        }
    }

    fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.settings.lockout_secs)
    }

    /// Is `key` currently locked out, and for how long
    ///
    /// A lockout that has run out is evicted here, so the next streak starts from zero.
    pub fn check_lockout(&self, key: &str) -> LockoutStatus {
        let now = self.clock.now();

        if self
            .attempts
            .remove_if(key, |_, record| {
                record.lockout_until.is_some_and(|until| until <= now)
            })
            .is_some()
        {
            debug!(key, "lockout elapsed");
            return LockoutStatus::open();
        }

        match self.attempts.get(key).and_then(|record| record.lockout_until) {
            Some(until) => LockoutStatus {
                is_locked: true,
                remaining: remaining(until, now),
            },
            None => LockoutStatus::open(),
        }
    }

    /// Record a failed authentication attempt
    ///
    /// The increment happens under the map entry's lock, so parallel failures for the
    /// same key are each counted exactly once.
    pub fn record_failure(&self, key: &str) -> LockoutStatus {
        let now = self.clock.now();

        let mut record = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| FailedAttemptRecord {
                count: 0,
                last_failure: now,
                lockout_until: None,
            });

        // A finished lockout starts a new streak
        if record.lockout_until.is_some_and(|until| until <= now) {
            record.count = 0;
            record.lockout_until = None;
        }

        record.count = record.count.saturating_add(1);
        record.last_failure = now;

        if let Some(until) = record.lockout_until {
            return LockoutStatus {
                is_locked: true,
                remaining: remaining(until, now),
            };
        }

        if record.count < self.settings.max_attempts {
            debug!(key, count = record.count, "authentication failure recorded");
            return LockoutStatus::open();
        }

        let until = now + span(self.lockout_duration());
        record.lockout_until = Some(until);
        // Release the shard lock before notifying subscribers
        drop(record);

        warn!(key, %until, "key locked out after repeated authentication failures");
        counter!(LOCKOUT_ENGAGED).increment(1);
        self.events.publish(SecurityEvent::LockoutEngaged {
            key: key.to_string(),
            until,
        });

        LockoutStatus {
            is_locked: true,
            remaining: self.lockout_duration(),
        }
    }

    /// Record a successful authentication
    pub fn record_success(&self, key: &str) {
        // On successful auth, remove the entry
        self.attempts.remove(key);
    }

    /// Current streak length for `key`
    pub fn failure_count(&self, key: &str) -> u32 {
        self.attempts.get(key).map_or(0, |record| record.count)
    }

    /// Clean up expired lockouts and stale streaks
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let retention = span(Duration::from_secs(self.settings.retention_secs));
        let before = self.attempts.len();

        self.attempts.retain(|_, record| match record.lockout_until {
            Some(until) => now < until,
            // Otherwise, keep streaks for the retention period
            None => now - record.last_failure < retention,
        });

        before.saturating_sub(self.attempts.len())
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
