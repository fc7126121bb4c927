// ==============
// crates/security-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCESS: &str = "security.login.success";
pub const LOGIN_FAILURE: &str = "security.login.failure";
pub const LOCKOUT_ENGAGED: &str = "security.lockout.engaged";
pub const RATE_LIMITED: &str = "security.rate_limited";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_INVALIDATED: &str = "session.invalidated";
pub const SESSION_ACTIVE: &str = "session.active";
pub const PERMISSION_CACHE_HIT: &str = "permission_cache.hit";
pub const PERMISSION_CACHE_MISS: &str = "permission_cache.miss";
pub const CSRF_ISSUED: &str = "csrf.issued";
pub const CSRF_REJECTED: &str = "csrf.rejected";
