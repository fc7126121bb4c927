//! In-process security event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Subscribers (window manager, audit log, open editors) receive every
//! [`SecurityEvent`] without registering callbacks inside the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Why a session stopped being valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    Logout,
    /// `invalidate_user_sessions` for the owning user
    UserWide,
    /// A new login on the same device overwrote it
    Replaced,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityEvent {
    LoginSucceeded {
        user_id: String,
        device_id: String,
    },
    LoginFailed {
        email: String,
        reason: &'static str,
    },
    LockoutEngaged {
        key: String,
        until: DateTime<Utc>,
    },
    SessionInvalidated {
        user_id: String,
        device_id: String,
        reason: InvalidationReason,
    },
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus; clones share the same channel.
#[derive(Debug, Clone)]
pub struct SecurityEvents {
    sender: broadcast::Sender<SecurityEvent>,
}

impl SecurityEvents {
    /// Slow receivers observe `RecvError::Lagged` once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped silently if there are none.
    pub fn publish(&self, event: SecurityEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SecurityEvent> {
        self.sender.subscribe()
    }
}

impl Default for SecurityEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
