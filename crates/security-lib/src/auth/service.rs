// ============================
// crates/security-lib/src/auth/service.rs
// ============================
use async_trait::async_trait;
use pacta_common::{
    Action, CsrfTokenResponse, DeviceRegistration, DeviceVerification, LoginRequest,
    LoginResponse, RefreshResponse, SessionUser,
};

use crate::error::SecurityResult;

/// Who a permission check is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal<'a> {
    /// A session token; its claims must verify
    Token(&'a str),
    /// A directory user id
    UserId(&'a str),
}

/// Arguments of [`AuthService::check_permission`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck<'a> {
    pub principal: Principal<'a>,
    pub resource: &'a str,
    pub action: Action,
}

impl<'a> PermissionCheck<'a> {
    pub fn for_token(token: &'a str, resource: &'a str, action: Action) -> Self {
        Self {
            principal: Principal::Token(token),
            resource,
            action,
        }
    }

    pub fn for_user(user_id: &'a str, resource: &'a str, action: Action) -> Self {
        Self {
            principal: Principal::UserId(user_id),
            resource,
            action,
        }
    }
}

/// Operations the security engine exposes to the rest of the application.
///
/// Login, verification and refresh return typed errors callers can branch on.
/// Permission, role, CSRF and device checks answer with a plain boolean and
/// deny on any internal failure.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, request: LoginRequest) -> SecurityResult<LoginResponse>;

    /// End the session behind `token`; an expired but authentic token still logs out
    fn logout(&self, token: &str) -> bool;

    fn verify_token(&self, token: &str) -> SecurityResult<SessionUser>;

    fn refresh_token(&self, token: &str) -> SecurityResult<RefreshResponse>;

    fn has_role(&self, token: &str, required_roles: &[&str]) -> bool;

    async fn check_permission(&self, check: PermissionCheck<'_>) -> bool;

    fn generate_csrf_token(&self, token: &str) -> SecurityResult<CsrfTokenResponse>;

    fn verify_csrf_token(&self, token: &str, csrf_token: &str) -> bool;

    fn register_device(&self, user_id: &str, device_id: &str) -> DeviceRegistration;

    fn verify_device(&self, user_id: &str, device_id: &str) -> DeviceVerification;

    fn invalidate_user_sessions(&self, user_id: &str, except_device_id: Option<&str>);
}
