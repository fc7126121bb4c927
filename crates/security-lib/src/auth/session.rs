// ============================
// crates/security-lib/src/auth/session.rs
// ============================
//! Server-side session registry.
//!
//! Signed tokens are stateless; this registry is what makes logout and
//! user-wide invalidation stick. Sessions are keyed by device id and a device
//! holds at most one session.
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge};
use subtle::ConstantTimeEq;

use super::token::MintedToken;
use crate::clock::SharedClock;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED};

/// Session information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub device_id: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    /// Build a session from a freshly minted token; its iat/exp become the session bounds
    pub fn from_token(
        minted: &MintedToken,
        device_id: impl Into<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let issued_at = unix(minted.claims.iat);
        Self {
            user_id: minted.claims.id.clone(),
            device_id: device_id.into(),
            token: minted.token.clone(),
            issued_at,
            expires_at: unix(minted.claims.exp),
            last_activity: issued_at,
            ip_address,
            user_agent,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `token`, presented by `user_id`, is the one this session currently holds
    pub fn is_held_by(&self, user_id: &str, token: &str) -> bool {
        self.user_id == user_id && bool::from(self.token.as_bytes().ct_eq(token.as_bytes()))
    }
}

fn unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Registry of live sessions
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
    clock: SharedClock,
}

impl SessionRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Store a session, returning the one it replaced on the same device
    pub fn register(&self, session: Session) -> Option<Session> {
        let replaced = self.sessions.insert(session.device_id.clone(), session);

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);

        replaced
    }

    /// Get the live session for a device; an expired one is evicted on the way
    pub fn get(&self, device_id: &str) -> Option<Session> {
        let now = self.clock.now();
        if self
            .sessions
            .remove_if(device_id, |_, session| session.is_expired(now))
            .is_some()
        {
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
            return None;
        }
        self.sessions.get(device_id).map(|entry| entry.clone())
    }

    /// Record activity on the session of `device_id` if `token` is its current token
    ///
    /// Replaced and pre-renewal tokens no longer match and get `None`.
    pub fn touch(&self, device_id: &str, user_id: &str, token: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut entry = self.sessions.get_mut(device_id)?;
        if !entry.is_held_by(user_id, token) || entry.is_expired(now) {
            return None;
        }
        entry.last_activity = now;
        Some(entry.clone())
    }

    /// Swap in a renewed token, provided the session still holds `previous_token`
    pub fn renew(&self, device_id: &str, previous_token: &str, minted: &MintedToken) -> bool {
        match self.sessions.get_mut(device_id) {
            Some(mut entry) if entry.is_held_by(&minted.claims.id, previous_token) => {
                entry.token = minted.token.clone();
                entry.issued_at = unix(minted.claims.iat);
                entry.expires_at = unix(minted.claims.exp);
                entry.last_activity = self.clock.now();
                true
            },
            _ => false,
        }
    }

    /// Remove the session of one device
    pub fn invalidate(&self, device_id: &str) -> Option<Session> {
        let removed = self.sessions.remove(device_id).map(|(_, session)| session);
        if removed.is_some() {
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        removed
    }

    /// Remove the session of `device_id` only while `token` of `user_id` is its current token
    pub fn invalidate_owned(&self, device_id: &str, user_id: &str, token: &str) -> Option<Session> {
        let removed = self
            .sessions
            .remove_if(device_id, |_, session| session.is_held_by(user_id, token))
            .map(|(_, session)| session);
        if removed.is_some() {
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        removed
    }

    /// Remove every session of `user_id`, optionally sparing one device
    pub fn invalidate_all_for_user(
        &self,
        user_id: &str,
        except_device_id: Option<&str>,
    ) -> Vec<Session> {
        let targets: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| Some(entry.key().as_str()) != except_device_id)
            .map(|entry| entry.key().clone())
            .collect();

        // Re-check ownership under the shard lock; the device may have been re-used meanwhile
        let removed: Vec<Session> = targets
            .iter()
            .filter_map(|device_id| {
                self.sessions
                    .remove_if(device_id, |_, session| session.user_id == user_id)
                    .map(|(_, session)| session)
            })
            .collect();

        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        removed
    }

    /// Drop every expired session
    pub fn sweep_expired(&self) -> Vec<Session> {
        let now = self.clock.now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let removed: Vec<Session> = expired
            .iter()
            .filter_map(|device_id| {
                self.sessions
                    .remove_if(device_id, |_, session| session.is_expired(now))
                    .map(|(_, session)| session)
            })
            .collect();

        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        removed
    }

    pub fn sessions_for_user(&self, user_id: &str) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Return count of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
