// ============================
// crates/security-lib/src/auth/permissions.rs
// ============================
//! Role permission cache.
//!
//! Roles are read from the user directory and kept for a fixed TTL. Permission
//! documents arrive in a few shapes (a JSON string, per-resource flag objects,
//! lists of action names) and are normalised into a [`PermissionSet`] once,
//! when they are cached.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use pacta_common::{Action, PermissionSet, ResourcePermissions};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{span, SharedClock};
use crate::directory::UserDirectory;
use crate::error::{SecurityError, SecurityResult};
use crate::metrics::{PERMISSION_CACHE_HIT, PERMISSION_CACHE_MISS};

/// Role name that is allowed everything
pub const ADMIN_ROLE: &str = "Admin";

/// A role with its normalised permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissions {
    pub role_id: String,
    pub name: String,
    pub permissions: PermissionSet,
}

impl RolePermissions {
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_ROLE
    }

    pub fn allows(&self, resource: &str, action: Action) -> bool {
        self.is_admin() || self.permissions.allows(resource, action)
    }
}

#[derive(Debug, Clone)]
struct RolePermissionCacheEntry {
    role: RolePermissions,
    cached_at: DateTime<Utc>,
}

/// TTL cache of role permissions in front of the user directory
#[derive(Clone)]
pub struct PermissionCache {
    entries: Arc<DashMap<String, RolePermissionCacheEntry>>,
    directory: Arc<dyn UserDirectory>,
    ttl: Duration,
    clock: SharedClock,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl PermissionCache {
    pub fn new(directory: Arc<dyn UserDirectory>, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            directory,
            ttl,
            clock,
        }
    }

    /// Permissions of `role_id`, from the cache while younger than the TTL
    pub async fn get_role_permissions(&self, role_id: &str) -> SecurityResult<RolePermissions> {
        let now = self.clock.now();
        let ttl = span(self.ttl);

        let cached = self
            .entries
            .get(role_id)
            .filter(|entry| now - entry.cached_at < ttl)
            .map(|entry| entry.role.clone());
        if let Some(role) = cached {
            counter!(PERMISSION_CACHE_HIT).increment(1);
            return Ok(role);
        }
        counter!(PERMISSION_CACHE_MISS).increment(1);

        let role = self
            .directory
            .find_role_by_id(role_id)
            .await
            .map_err(|e| {
                warn!(role_id, error = %e, "failed to load role permissions");
                SecurityError::Directory(e.to_string())
            })?
            .ok_or_else(|| {
                warn!(role_id, "role not found in directory");
                SecurityError::Directory(format!("role {role_id} not found"))
            })?;

        let role = RolePermissions {
            role_id: role.id,
            name: role.name,
            permissions: normalize_permissions(&role.permissions),
        };
        debug!(role_id, resources = role.permissions.len(), "role permissions cached");

        self.entries.insert(
            role_id.to_string(),
            RolePermissionCacheEntry {
                role: role.clone(),
                cached_at: self.clock.now(),
            },
        );

        Ok(role)
    }

    pub fn invalidate(&self, role_id: &str) {
        self.entries.remove(role_id);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Drop stale entries
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = span(self.ttl);
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.cached_at < ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalise a raw permission document into a [`PermissionSet`]
///
/// Accepted per resource: an object of action flags, a list of action names, or
/// `true` for every action. A document that is not an object (after decoding a
/// JSON string) yields an empty set, which denies everything.
pub fn normalize_permissions(raw: &Value) -> PermissionSet {
    let decoded;
    let document = match raw {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                decoded = value;
                &decoded
            },
            Err(e) => {
                warn!(error = %e, "permission document is not valid JSON");
                return PermissionSet::new();
            },
        },
        other => other,
    };

    let resources = match document {
        Value::Object(resources) => resources,
        Value::Null => return PermissionSet::new(),
        _ => {
            warn!("permission document is not an object");
            return PermissionSet::new();
        },
    };

    let mut set = PermissionSet::new();
    for (resource, grant) in resources {
        let permissions = match grant {
            Value::Object(flags) => {
                let mut permissions = ResourcePermissions::default();
                for (action, flag) in flags {
                    match action.parse::<Action>() {
                        Ok(action) if flag.as_bool() == Some(true) => permissions.grant(action),
                        Ok(_) => {},
                        Err(_) => debug!(resource = %resource, action = %action, "ignoring unknown permission action"),
                    }
                }
                permissions
            },
            Value::Array(actions) => {
                let mut permissions = ResourcePermissions::default();
                for action in actions.iter().filter_map(Value::as_str) {
                    match action.parse::<Action>() {
                        Ok(action) => permissions.grant(action),
                        Err(_) => debug!(resource = %resource, action = %action, "ignoring unknown permission action"),
                    }
                }
                permissions
            },
            Value::Bool(true) => ResourcePermissions::all(),
            Value::Bool(false) => ResourcePermissions::default(),
            _ => {
                warn!(resource = %resource, "unsupported permission grant, resource denied");
                continue;
            },
        };
        set.0.insert(resource.clone(), permissions);
    }
    set
}
