// ============================
// crates/security-lib/src/auth/device.rs
// ============================
//! Known devices per user.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pacta_common::{DeviceRegistration, DeviceVerification};
use tracing::{debug, info};

use crate::clock::{span, SharedClock};

#[derive(Debug, Clone)]
struct DeviceRecord {
    user_id: String,
    last_active: DateTime<Utc>,
}

/// Registry of (user, device) pairs with their last activity
#[derive(Debug, Clone)]
pub struct DeviceTrustStore {
    devices: Arc<DashMap<String, DeviceRecord>>,
    inactivity: Duration,
    clock: SharedClock,
}

impl DeviceTrustStore {
    pub fn new(inactivity: Duration, clock: SharedClock) -> Self {
        Self {
            devices: Arc::new(DashMap::new()),
            inactivity,
            clock,
        }
    }

    fn is_stale(&self, record: &DeviceRecord, now: DateTime<Utc>) -> bool {
        now - record.last_active > span(self.inactivity)
    }

    /// Insert or overwrite the owner of `device_id`
    pub fn register(&self, user_id: &str, device_id: &str) -> DeviceRegistration {
        let previous = self.devices.insert(
            device_id.to_string(),
            DeviceRecord {
                user_id: user_id.to_string(),
                last_active: self.clock.now(),
            },
        );
        if previous.is_some_and(|record| record.user_id != user_id) {
            info!(user_id, device_id, "device re-registered to a different user");
        }
        DeviceRegistration { success: true }
    }

    /// Unseen (or long idle) devices are valid but untrusted; a known device is
    /// touched and trusted only for its own user.
    pub fn verify(&self, user_id: &str, device_id: &str) -> DeviceVerification {
        let now = self.clock.now();

        if self
            .devices
            .remove_if(device_id, |_, record| self.is_stale(record, now))
            .is_some()
        {
            debug!(device_id, "inactive device forgotten");
        }

        match self.devices.get_mut(device_id) {
            Some(mut record) => {
                let trusted = record.user_id == user_id;
                // Only the owner keeps a device alive
                if trusted {
                    record.last_active = now;
                }
                DeviceVerification {
                    valid: true,
                    trusted,
                }
            },
            None => DeviceVerification {
                valid: true,
                trusted: false,
            },
        }
    }

    /// Remove devices idle past the inactivity horizon
    pub fn sweep_inactive(&self) -> usize {
        let now = self.clock.now();
        let before = self.devices.len();
        self.devices.retain(|_, record| !self.is_stale(record, now));
        before.saturating_sub(self.devices.len())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
