// ============================
// crates/security-lib/src/lib.rs
// ============================
//! Authentication and session-security engine for the Pacta contract manager.
//!
//! [`SecurityService`] is the only entry point callers need: build one per
//! process at startup and share it by handle.

pub mod auth;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod maintenance;
pub mod metrics;

pub use auth::{AuthService, PermissionCheck, Principal, SecurityService};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Settings;
pub use directory::{DirectoryRole, DirectoryUser, MemoryDirectory, UserDirectory};
pub use error::{SecurityError, SecurityResult};
pub use events::{InvalidationReason, SecurityEvent, SecurityEvents};
pub use maintenance::{MaintenanceHandle, SweepReport};
