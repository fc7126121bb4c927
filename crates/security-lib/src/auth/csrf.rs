// ============================
// crates/security-lib/src/auth/csrf.rs
// ============================
//! CSRF tokens bound to a session.
//!
//! Entries are keyed by the SHA-256 fingerprint of the session token, so the raw
//! session token is not stored a second time. One active CSRF token per session;
//! issuing again replaces it. Tokens stay valid until they expire or the session
//! logs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::token_generator::{fingerprint, generate_secure_token};
use crate::clock::{span, SharedClock};
use crate::metrics::{CSRF_ISSUED, CSRF_REJECTED};

#[derive(Debug, Clone)]
struct CsrfTokenEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Issues and checks per-session CSRF tokens
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    entries: Arc<DashMap<String, CsrfTokenEntry>>,
    ttl: Duration,
    clock: SharedClock,
}

impl CsrfGuard {
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock,
        }
    }

    /// Issue a fresh CSRF token for `session_token`, replacing any previous one
    pub fn issue(&self, session_token: &str) -> String {
        let session_id = fingerprint(session_token);
        let token = generate_secure_token();
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(span(self.ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries.insert(
            session_id,
            CsrfTokenEntry {
                token: token.clone(),
                expires_at,
            },
        );
        counter!(CSRF_ISSUED).increment(1);

        token
    }

    /// Check `csrf_token` against the one issued for `session_token`
    ///
    /// Missing, expired and mismatched tokens all fail; an expired entry is evicted.
    pub fn verify(&self, session_token: &str, csrf_token: &str) -> bool {
        let session_id = fingerprint(session_token);
        let now = self.clock.now();

        if self
            .entries
            .remove_if(&session_id, |_, entry| now > entry.expires_at)
            .is_some()
        {
            debug!("expired csrf token evicted");
            return self.reject();
        }

        let matched = self.entries.get(&session_id).is_some_and(|entry| {
            bool::from(entry.token.as_bytes().ct_eq(csrf_token.as_bytes()))
        });

        if matched {
            true
        } else {
            self.reject()
        }
    }

    fn reject(&self) -> bool {
        counter!(CSRF_REJECTED).increment(1);
        false
    }

    /// Drop the CSRF token bound to `session_token`
    pub fn revoke(&self, session_token: &str) -> bool {
        self.entries.remove(&fingerprint(session_token)).is_some()
    }

    /// Move the CSRF token of `old_session_token` over to its renewed token
    pub fn rebind(&self, old_session_token: &str, new_session_token: &str) -> bool {
        match self.entries.remove(&fingerprint(old_session_token)) {
            Some((_, entry)) => {
                self.entries.insert(fingerprint(new_session_token), entry);
                true
            },
            None => false,
        }
    }

    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now <= entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
