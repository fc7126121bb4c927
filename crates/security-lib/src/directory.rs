// ============================
// crates/security-lib/src/directory.rs
// ============================
//! User directory abstraction with an in-memory implementation.
//!
//! The persistent user and role store lives outside the security engine; the
//! engine only reads users and roles through [`UserDirectory`].
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A user record as stored by the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    pub email: String,
    /// PHC-formatted password hash
    pub password_hash: String,
    pub is_active: bool,
    pub role_id: String,
}

/// A role and its raw permission document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryRole {
    pub id: String,
    pub name: String,
    /// Either a JSON object or a string holding JSON; normalised by the permission cache
    pub permissions: serde_json::Value,
}

/// Trait for user directory backends
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look a user up by (already normalised) email
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<DirectoryUser>>;

    async fn find_user_by_id(&self, user_id: &str) -> anyhow::Result<Option<DirectoryUser>>;

    async fn find_role_by_id(&self, role_id: &str) -> anyhow::Result<Option<DirectoryRole>>;

    /// Record a successful login
    async fn touch_last_login(&self, user_id: &str) -> anyhow::Result<()>;
}

/// In-memory directory used by tests and local tooling
///
/// Lookups are counted so callers can observe caching behaviour.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<String, DirectoryUser>,
    roles: DashMap<String, DirectoryRole>,
    last_login: DashMap<String, DateTime<Utc>>,
    email_lookups: AtomicUsize,
    id_lookups: AtomicUsize,
    role_lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert_user(&self, user: DirectoryUser) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_role(&self, role: DirectoryRole) {
        self.roles.insert(role.id.clone(), role);
    }

    /// Make every call fail, as a dropped database connection would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }

    pub fn id_lookups(&self) -> usize {
        self.id_lookups.load(Ordering::SeqCst)
    }

    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    /// Total number of directory reads
    pub fn total_lookups(&self) -> usize {
        self.email_lookups() + self.id_lookups() + self.role_lookups()
    }

    pub fn last_login(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.last_login.get(user_id).map(|entry| *entry)
    }

    fn ensure_available(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("user directory unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<DirectoryUser>> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.clone()))
    }

    async fn find_user_by_id(&self, user_id: &str) -> anyhow::Result<Option<DirectoryUser>> {
        self.id_lookups.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self.users.get(user_id).map(|entry| entry.clone()))
    }

    async fn find_role_by_id(&self, role_id: &str) -> anyhow::Result<Option<DirectoryRole>> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self.roles.get(role_id).map(|entry| entry.clone()))
    }

    async fn touch_last_login(&self, user_id: &str) -> anyhow::Result<()> {
        self.ensure_available()?;
        if !self.users.contains_key(user_id) {
            bail!("unknown user {user_id}");
        }
        self.last_login.insert(user_id.to_string(), Utc::now());
        Ok(())
    }
}
