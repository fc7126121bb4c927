// ============================
// crates/security-lib/src/auth/service_impl.rs
// ============================
//! The security facade: one explicitly constructed instance per process.
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use pacta_common::{
    CsrfTokenResponse, DeviceRegistration, DeviceVerification, LoginRequest, LoginResponse,
    RefreshResponse, SessionUser, TokenVerification, UserInfo,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::bootstrap::{
    bootstrap_permissions, bootstrap_user, is_bootstrap_email, is_bootstrap_user_id,
};
use super::csrf::CsrfGuard;
use super::device::DeviceTrustStore;
use super::lockout::LockoutGuard;
use super::password::verify_password_blocking;
use super::permissions::{PermissionCache, ADMIN_ROLE};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::service::{AuthService, PermissionCheck, Principal};
use super::session::{Session, SessionRegistry};
use super::token::{Claims, Refresh, TokenIssuer, TokenSubject};
use crate::clock::{system_clock, SharedClock};
use crate::config::Settings;
use crate::directory::UserDirectory;
use crate::error::{SecurityError, SecurityResult};
use crate::events::{InvalidationReason, SecurityEvent, SecurityEvents};
use crate::maintenance::{MaintenanceHandle, SweepReport};
use crate::metrics::{LOGIN_FAILURE, LOGIN_SUCCESS, SESSION_INVALIDATED};

/// Lower-case and trim an email so every store keys it the same way
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Security engine facade
#[derive(Clone)]
pub struct SecurityService {
    settings: Arc<Settings>,
    issuer: Arc<TokenIssuer>,
    directory: Arc<dyn UserDirectory>,
    sessions: SessionRegistry,
    lockout: LockoutGuard,
    login_limiter: RateLimiter,
    api_limiter: RateLimiter,
    permissions: PermissionCache,
    csrf: CsrfGuard,
    devices: DeviceTrustStore,
    events: SecurityEvents,
}

impl std::fmt::Debug for SecurityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityService")
            .field("issuer", &self.issuer)
            .field("sessions", &self.sessions.len())
            .field("bootstrap_accounts", &self.settings.allow_bootstrap_accounts)
            .finish_non_exhaustive()
    }
}

impl SecurityService {
    /// Build the engine on the system clock
    ///
    /// Fails with [`SecurityError::Configuration`] if the settings are unusable,
    /// most notably when no signing secret is provisioned.
    pub fn new(settings: Settings, directory: Arc<dyn UserDirectory>) -> SecurityResult<Self> {
        Self::with_clock(settings, directory, system_clock())
    }

    pub fn with_clock(
        settings: Settings,
        directory: Arc<dyn UserDirectory>,
        clock: SharedClock,
    ) -> SecurityResult<Self> {
        settings.validate()?;

        let events = SecurityEvents::default();
        let issuer = TokenIssuer::from_settings(&settings, clock.clone())?;

        if settings.allow_bootstrap_accounts {
            warn!("bootstrap accounts are enabled; never run production with allow_bootstrap_accounts");
        }

        Ok(Self {
            issuer: Arc::new(issuer),
            sessions: SessionRegistry::new(clock.clone()),
            lockout: LockoutGuard::new(settings.lockout, clock.clone(), events.clone()),
            login_limiter: RateLimiter::login(settings.login_rate_limit, clock.clone()),
            api_limiter: RateLimiter::api(settings.api_rate_limit, clock.clone()),
            permissions: PermissionCache::new(
                directory.clone(),
                settings.permission_cache_ttl(),
                clock.clone(),
            ),
            csrf: CsrfGuard::new(settings.csrf_ttl(), clock.clone()),
            devices: DeviceTrustStore::new(settings.device_inactivity(), clock),
            directory,
            events,
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn lockout(&self) -> &LockoutGuard {
        &self.lockout
    }

    pub fn permissions(&self) -> &PermissionCache {
        &self.permissions
    }

    pub fn events(&self) -> &SecurityEvents {
        &self.events
    }

    /// Receive every security event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SecurityEvent> {
        self.events.subscribe()
    }

    /// Take one point from the API limiter for `key`
    pub fn check_api_rate_limit(&self, key: &str) -> SecurityResult<RateLimitDecision> {
        let decision = self.api_limiter.consume(key);
        if !decision.allowed {
            return Err(SecurityError::RateLimited {
                retry_after: decision.retry_after,
            });
        }
        Ok(decision)
    }

    /// [`AuthService::verify_token`] in wire form
    pub fn verify_token_response(&self, token: &str) -> TokenVerification {
        match self.verify_token(token) {
            Ok(user) => TokenVerification::valid(user),
            Err(e) => TokenVerification::invalid(e.to_string()),
        }
    }

    /// [`AuthService::refresh_token`] in wire form
    pub fn refresh_token_response(&self, token: &str) -> RefreshResponse {
        self.refresh_token(token)
            .unwrap_or_else(|e| RefreshResponse::failed(e.to_string()))
    }

    /// Start the periodic sweeps; they stop when the handle is dropped
    pub fn spawn_maintenance(&self) -> MaintenanceHandle {
        MaintenanceHandle::spawn(self.clone(), self.settings.sweep_interval())
    }

    /// Drop expired sessions
    pub fn sweep_sessions(&self) -> usize {
        let expired = self.sessions.sweep_expired();
        for session in &expired {
            self.csrf.revoke(&session.token);
            self.session_ended(session, InvalidationReason::Expired);
        }
        expired.len()
    }

    /// Drop expired CSRF tokens
    pub fn sweep_csrf(&self) -> usize {
        self.csrf.sweep_expired()
    }

    /// Drop finished lockouts, stale failure streaks and idle rate-limit buckets
    pub fn sweep_throttles(&self) -> usize {
        self.lockout.cleanup() + self.login_limiter.sweep() + self.api_limiter.sweep()
    }

    /// Forget devices past the inactivity horizon
    pub fn sweep_devices(&self) -> usize {
        self.devices.sweep_inactive()
    }

    /// One pass of every sweep
    pub fn run_sweeps(&self) -> SweepReport {
        let report = SweepReport {
            sessions: self.sweep_sessions(),
            csrf_tokens: self.sweep_csrf(),
            throttles: self.sweep_throttles(),
            devices: self.sweep_devices(),
            permissions: self.permissions.sweep_expired(),
        };
        debug!(?report, "maintenance sweep finished");
        report
    }

    fn bootstrap_login(&self, email: &str, password: &str) -> Option<UserInfo> {
        if !self.settings.allow_bootstrap_accounts {
            if is_bootstrap_email(email) {
                warn!(email, "bootstrap account login attempted while bootstrap accounts are disabled");
            }
            return None;
        }
        let user = bootstrap_user(email, password)?;
        warn!(user_id = %user.id, "bootstrap account login; development use only");
        Some(user)
    }

    /// Credential check against the directory; failures count towards lockout
    async fn directory_login(
        &self,
        email: &str,
        password: Zeroizing<String>,
    ) -> SecurityResult<UserInfo> {
        let user = self
            .directory
            .find_user_by_email(email)
            .await
            .map_err(|e| {
                warn!(error = %e, "user directory lookup failed during login");
                SecurityError::Directory(e.to_string())
            })?;

        let user = match user {
            Some(user) if user.is_active => user,
            Some(_) => return Err(self.reject_credentials(email, "inactive_account")),
            None => return Err(self.reject_credentials(email, "unknown_user")),
        };

        if !verify_password_blocking(user.password_hash.clone(), password).await? {
            return Err(self.reject_credentials(email, "bad_password"));
        }

        let role = self.permissions.get_role_permissions(&user.role_id).await?;

        Ok(UserInfo {
            id: user.id,
            email: user.email,
            role: role.name,
            permissions: role.permissions,
        })
    }

    fn reject_credentials(&self, email: &str, reason: &'static str) -> SecurityError {
        self.lockout.record_failure(email);
        self.login_failed(email, reason);
        SecurityError::Authentication
    }

    fn login_failed(&self, email: &str, reason: &'static str) {
        debug!(email, reason, "login rejected");
        counter!(LOGIN_FAILURE, "reason" => reason).increment(1);
        self.events.publish(SecurityEvent::LoginFailed {
            email: email.to_string(),
            reason,
        });
    }

    fn session_ended(&self, session: &Session, reason: InvalidationReason) {
        counter!(SESSION_INVALIDATED).increment(1);
        self.events.publish(SecurityEvent::SessionInvalidated {
            user_id: session.user_id.clone(),
            device_id: session.device_id.clone(),
            reason,
        });
    }

    /// Tokens bound to a device are only live while that device's session is
    fn require_session(&self, token: &str, claims: &Claims) -> SecurityResult<SessionUser> {
        if let Some(device_id) = claims.device_id.as_deref() {
            if self.sessions.touch(device_id, &claims.id, token).is_none() {
                debug!(user_id = %claims.id, device_id, "token has no live session");
                return Err(SecurityError::SessionNotFound);
            }
        }
        Ok(SessionUser {
            id: claims.id.clone(),
            email: claims.email.clone(),
            role: claims.role.clone(),
            device_id: claims.device_id.clone(),
        })
    }

    /// Permission lookup through the directory and the role cache; any failure denies
    async fn user_has_permission(&self, user_id: &str, check: &PermissionCheck<'_>) -> bool {
        if is_bootstrap_user_id(user_id) {
            return self.settings.allow_bootstrap_accounts
                && bootstrap_permissions().allows(check.resource, check.action);
        }

        let user = match self.directory.find_user_by_id(user_id).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => {
                debug!(user_id, "permission denied: unknown or inactive user");
                return false;
            },
            Err(e) => {
                warn!(user_id, error = %e, "permission denied: directory lookup failed");
                return false;
            },
        };

        match self.permissions.get_role_permissions(&user.role_id).await {
            Ok(role) => role.allows(check.resource, check.action),
            Err(e) => {
                warn!(user_id, role_id = %user.role_id, error = %e, "permission denied: role lookup failed");
                false
            },
        }
    }
}

#[async_trait]
impl AuthService for SecurityService {
    async fn login(&self, request: LoginRequest) -> SecurityResult<LoginResponse> {
        let LoginRequest {
            email,
            password,
            remember_me,
            device_id,
            ip_address,
            user_agent,
        } = request;
        let password = Zeroizing::new(password);
        let email = normalize_email(&email);

        let lockout = self.lockout.check_lockout(&email);
        if lockout.is_locked {
            self.login_failed(&email, "locked_out");
            return Err(SecurityError::LockedOut {
                remaining: lockout.remaining,
            });
        }

        let limit_key = format!(
            "login:{email}:{}",
            ip_address.as_deref().unwrap_or("unknown")
        );
        let decision = self.login_limiter.consume(&limit_key);
        if !decision.allowed {
            self.lockout.record_failure(&email);
            self.login_failed(&email, "rate_limited");
            return Err(SecurityError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let bootstrap_user = self.bootstrap_login(&email, &password);
        let (user, bootstrap) = match bootstrap_user {
            Some(user) => (user, true),
            None => (self.directory_login(&email, password).await?, false),
        };

        self.lockout.record_success(&email);
        self.login_limiter.reset(&limit_key);

        let ttl = if remember_me {
            &self.settings.remember_me_ttl
        } else {
            &self.settings.session_ttl
        };
        let device_id = device_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let minted = self.issuer.mint(
            &TokenSubject {
                user_id: user.id.clone(),
                email: user.email.clone(),
                role: user.role.clone(),
                device_id: Some(device_id.clone()),
            },
            ttl,
        )?;

        let session = Session::from_token(&minted, device_id.clone(), ip_address, user_agent);
        if let Some(replaced) = self
            .sessions
            .register(session)
            .filter(|replaced| replaced.token != minted.token)
        {
            self.csrf.revoke(&replaced.token);
            self.session_ended(&replaced, InvalidationReason::Replaced);
        }

        if !bootstrap {
            if let Err(e) = self.directory.touch_last_login(&user.id).await {
                warn!(user_id = %user.id, error = %e, "failed to record last login");
            }
        }

        counter!(LOGIN_SUCCESS).increment(1);
        info!(user_id = %user.id, device_id = %device_id, remember_me, "login succeeded");
        self.events.publish(SecurityEvent::LoginSucceeded {
            user_id: user.id.clone(),
            device_id: device_id.clone(),
        });

        Ok(LoginResponse {
            token: minted.token,
            user,
            expires_at: minted.claims.exp,
            device_id,
        })
    }

    fn logout(&self, token: &str) -> bool {
        let claims = match self.issuer.verify_signature(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "logout with unverifiable token ignored");
                return false;
            },
        };

        self.csrf.revoke(token);
        if let Some(device_id) = claims.device_id.as_deref() {
            if let Some(session) = self.sessions.invalidate_owned(device_id, &claims.id, token) {
                info!(user_id = %claims.id, device_id, "logged out");
                self.session_ended(&session, InvalidationReason::Logout);
            }
        }
        true
    }

    fn verify_token(&self, token: &str) -> SecurityResult<SessionUser> {
        let claims = self.issuer.verify(token)?;
        self.require_session(token, &claims)
    }

    fn refresh_token(&self, token: &str) -> SecurityResult<RefreshResponse> {
        let claims = self.issuer.verify(token)?;
        self.require_session(token, &claims)?;

        let refreshed = self.issuer.refresh(token)?;
        if let Refresh::Renewed(minted) = &refreshed {
            if let Some(device_id) = minted.claims.device_id.as_deref() {
                // A concurrent refresh or logout got there first
                if !self.sessions.renew(device_id, token, minted) {
                    debug!(user_id = %minted.claims.id, device_id, "session changed during refresh");
                    return Err(SecurityError::SessionNotFound);
                }
            }
            self.csrf.rebind(token, &minted.token);
            debug!(user_id = %minted.claims.id, "session token renewed");
        }

        Ok(RefreshResponse {
            valid: true,
            renewed: refreshed.renewed(),
            token: Some(refreshed.token().to_string()),
            expires_at: Some(refreshed.claims().exp),
            error: None,
        })
    }

    fn has_role(&self, token: &str, required_roles: &[&str]) -> bool {
        match self.verify_token(token) {
            Ok(user) => required_roles.iter().any(|role| *role == user.role),
            Err(_) => false,
        }
    }

    async fn check_permission(&self, check: PermissionCheck<'_>) -> bool {
        match check.principal {
            Principal::Token(token) => {
                let user = match self.verify_token(token) {
                    Ok(user) => user,
                    Err(e) => {
                        debug!(error = %e, "permission denied: token rejected");
                        return false;
                    },
                };
                if user.role == ADMIN_ROLE {
                    return true;
                }
                self.user_has_permission(&user.id, &check).await
            },
            Principal::UserId(user_id) => self.user_has_permission(user_id, &check).await,
        }
    }

    fn generate_csrf_token(&self, token: &str) -> SecurityResult<CsrfTokenResponse> {
        self.verify_token(token)?;
        Ok(CsrfTokenResponse {
            csrf_token: self.csrf.issue(token),
        })
    }

    fn verify_csrf_token(&self, token: &str, csrf_token: &str) -> bool {
        if self.verify_token(token).is_err() {
            return false;
        }
        self.csrf.verify(token, csrf_token)
    }

    fn register_device(&self, user_id: &str, device_id: &str) -> DeviceRegistration {
        self.devices.register(user_id, device_id)
    }

    fn verify_device(&self, user_id: &str, device_id: &str) -> DeviceVerification {
        self.devices.verify(user_id, device_id)
    }

    fn invalidate_user_sessions(&self, user_id: &str, except_device_id: Option<&str>) {
        let removed = self.sessions.invalidate_all_for_user(user_id, except_device_id);
        for session in &removed {
            self.csrf.revoke(&session.token);
            self.session_ended(session, InvalidationReason::UserWide);
        }
        info!(user_id, removed = removed.len(), "user sessions invalidated");
    }
}
