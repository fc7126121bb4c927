// ============================
// crates/security-lib/src/auth/mod.rs
// ============================
//! Authentication and session security.

pub mod bootstrap;
pub mod csrf;
pub mod device;
pub mod lockout;
pub mod password;
pub mod permissions;
pub mod rate_limit;
pub mod session;
pub mod token;
pub mod token_generator;
mod service;
mod service_impl;

pub use csrf::CsrfGuard;
pub use device::DeviceTrustStore;
pub use lockout::{LockoutGuard, LockoutStatus};
pub use password::{hash_password, verify_password};
pub use permissions::{normalize_permissions, PermissionCache, RolePermissions, ADMIN_ROLE};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use service::{AuthService, PermissionCheck, Principal};
pub use service_impl::{normalize_email, SecurityService};
pub use session::{Session, SessionRegistry};
pub use token::{Claims, MintedToken, Refresh, TokenIssuer, TokenSubject};
