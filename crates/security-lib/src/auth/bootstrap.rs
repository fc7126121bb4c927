// ============================
// crates/security-lib/src/auth/bootstrap.rs
// ============================
//! Development-only bootstrap logins.
//!
//! Two fixed accounts authenticate with a fixed password without touching the
//! user directory. They exist so a fresh install can be explored before any
//! users are seeded, and are only honoured when `allow_bootstrap_accounts` is
//! set. Every use is logged at `warn`.
use pacta_common::{PermissionSet, ResourcePermissions, UserInfo};
use subtle::ConstantTimeEq;

use super::permissions::ADMIN_ROLE;

/// Password accepted for every bootstrap account
pub const BOOTSTRAP_PASSWORD: &str = "pacta";

/// (email, user id) of the bootstrap accounts
const BOOTSTRAP_ACCOUNTS: [(&str, &str); 2] = [
    ("admin@pacta.app", "bootstrap-admin"),
    ("ra@pacta.app", "bootstrap-ra"),
];

/// Resources granted in full to bootstrap accounts
const BOOTSTRAP_RESOURCES: [&str; 9] = [
    "contracts",
    "supplements",
    "documents",
    "clients",
    "suppliers",
    "users",
    "reports",
    "notifications",
    "backups",
];

/// Synthetic user for a bootstrap login
pub fn bootstrap_user(email: &str, password: &str) -> Option<UserInfo> {
    let (email, user_id) = BOOTSTRAP_ACCOUNTS
        .iter()
        .find(|(known, _)| *known == email)?;

    let password_ok: bool = password
        .as_bytes()
        .ct_eq(BOOTSTRAP_PASSWORD.as_bytes())
        .into();
    if !password_ok {
        return None;
    }

    Some(UserInfo {
        id: (*user_id).to_string(),
        email: (*email).to_string(),
        role: ADMIN_ROLE.to_string(),
        permissions: bootstrap_permissions(),
    })
}

/// Whether `email` names a bootstrap account
pub fn is_bootstrap_email(email: &str) -> bool {
    BOOTSTRAP_ACCOUNTS.iter().any(|(known, _)| *known == email)
}

/// Whether `user_id` belongs to a bootstrap account
pub fn is_bootstrap_user_id(user_id: &str) -> bool {
    BOOTSTRAP_ACCOUNTS.iter().any(|(_, id)| *id == user_id)
}

pub fn bootstrap_permissions() -> PermissionSet {
    BOOTSTRAP_RESOURCES
        .iter()
        .fold(PermissionSet::new(), |set, resource| {
            set.with(*resource, ResourcePermissions::all())
        })
}
