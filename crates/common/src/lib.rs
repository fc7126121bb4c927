// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! exchanged between the `Pacta` desktop shell and its security engine.
//! This module defines the request/response shapes and the RBAC vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Login request sent by the shell
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl LoginRequest {
    /// Minimal request with only credentials
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Authenticated user as returned by a successful login
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    /// Role name, e.g. `"Admin"`
    pub role: String,
    pub permissions: PermissionSet,
}

/// Response to a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
    /// Token expiry (unix seconds)
    pub expires_at: Timestamp,
    /// Device the session was registered under
    pub device_id: String,
}

/// Identity carried by a verified session token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Outcome of `verifyToken` in wire form
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenVerification {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenVerification {
    pub fn valid(user: SessionUser) -> Self {
        Self {
            valid: true,
            user: Some(user),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            user: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of `refreshToken` in wire form
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub valid: bool,
    pub renewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            renewed: false,
            token: None,
            expires_at: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub success: bool,
}

/// Result of checking a device against the trust store
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceVerification {
    /// The device id is acceptable for this user
    pub valid: bool,
    /// The device has been seen before for this same user
    pub trusted: bool,
}

/// Operation that can be granted on a resource
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
    Execute,
    View,
    Modify,
    Export,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Read,
        Action::Write,
        Action::Delete,
        Action::Execute,
        Action::View,
        Action::Modify,
        Action::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Execute => "execute",
            Action::View => "view",
            Action::Modify => "modify",
            Action::Export => "export",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an action name is not part of the vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action `{}`", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == lower)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Flags granted on a single resource
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ResourcePermissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub execute: bool,
    pub view: bool,
    pub modify: bool,
    pub export: bool,
}

impl ResourcePermissions {
    /// Every action granted
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
            execute: true,
            view: true,
            modify: true,
            export: true,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Delete => self.delete,
            Action::Execute => self.execute,
            Action::View => self.view,
            Action::Modify => self.modify,
            Action::Export => self.export,
        }
    }

    pub fn grant(&mut self, action: Action) {
        match action {
            Action::Read => self.read = true,
            Action::Write => self.write = true,
            Action::Delete => self.delete = true,
            Action::Execute => self.execute = true,
            Action::View => self.view = true,
            Action::Modify => self.modify = true,
            Action::Export => self.export = true,
        }
    }
}

/// Map of `resource -> granted actions` attached to a role
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(pub BTreeMap<String, ResourcePermissions>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the grants for `resource`
    pub fn with(mut self, resource: impl Into<String>, permissions: ResourcePermissions) -> Self {
        self.0.insert(resource.into(), permissions);
        self
    }

    pub fn get(&self, resource: &str) -> Option<&ResourcePermissions> {
        self.0.get(resource)
    }

    /// Unknown resources are denied.
    pub fn allows(&self, resource: &str, action: Action) -> bool {
        self.0
            .get(resource)
            .map(|grants| grants.allows(action))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
