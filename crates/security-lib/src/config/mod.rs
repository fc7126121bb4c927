// ============================
// crates/security-lib/src/config/mod.rs
// ============================
//! Configuration management.
//!
//! Settings come from `pacta-security.toml` merged with `PACTA_`-prefixed
//! environment variables (nested keys use `__`, e.g.
//! `PACTA_LOGIN_RATE_LIMIT__POINTS`). The signing secret has exactly one
//! resolution path through these layers; there is no generated fallback.
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::error::{SecurityError, SecurityResult};


/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pacta-security.toml";
/// Prefix of the environment overrides
pub const ENV_PREFIX: &str = "PACTA_";
/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;
/// Longest accepted TTL or period
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Engine settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HMAC signing secret
    pub jwt_secret: Option<String>,
    /// `HS256`, `HS384` or `HS512`
    pub jwt_algorithm: String,
    pub token_issuer: String,
    pub token_audience: String,
    /// TTL of a normal login, e.g. `"8h"`
    pub session_ttl: String,
    /// TTL when the user asks to be remembered, e.g. `"30d"`
    pub remember_me_ttl: String,
    pub lockout: LockoutSettings,
    pub login_rate_limit: RateLimitSettings,
    pub api_rate_limit: RateLimitSettings,
    pub permission_cache_ttl_secs: u64,
    pub csrf_ttl_secs: u64,
    pub device_inactivity_days: u64,
    pub sweep_interval_secs: u64,
    /// Development only: enables the fixed bootstrap logins
    pub allow_bootstrap_accounts: bool,
    pub log_level: String,
}

/// Brute-force lockout parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockoutSettings {
    /// Failures before the key is locked
    pub max_attempts: u32,
    pub lockout_secs: u64,
    /// Unlocked failure streaks older than this are swept
    pub retention_secs: u64,
}

/// Parameters of one rate limiter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub points: u32,
    pub window_secs: u64,
    /// Extra block once the points are exhausted
    #[serde(default)]
    pub block_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_algorithm: "HS256".to_string(),
            token_issuer: "pacta-desktop".to_string(),
            token_audience: "pacta-users".to_string(),
            session_ttl: "8h".to_string(),
            remember_me_ttl: "30d".to_string(),
            lockout: LockoutSettings::default(),
            login_rate_limit: RateLimitSettings::login(),
            api_rate_limit: RateLimitSettings::api(),
            permission_cache_ttl_secs: 5 * 60,
            csrf_ttl_secs: 24 * 60 * 60,
            device_inactivity_days: 30,
            sweep_interval_secs: 5 * 60,
            allow_bootstrap_accounts: false,
            log_level: "info".to_string(),
        }
    }
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 15 * 60,
            retention_secs: 24 * 60 * 60,
        }
    }
}

impl RateLimitSettings {
    /// 5 points per 15 minutes, then blocked for 30 minutes
    pub fn login() -> Self {
        Self {
            points: 5,
            window_secs: 15 * 60,
            block_secs: Some(30 * 60),
        }
    }

    /// 100 points per minute, no extended block
    pub fn api() -> Self {
        Self {
            points: 100,
            window_secs: 60,
            block_secs: None,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn block(&self) -> Option<Duration> {
        self.block_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("token_issuer", &self.token_issuer)
            .field("token_audience", &self.token_audience)
            .field("session_ttl", &self.session_ttl)
            .field("remember_me_ttl", &self.remember_me_ttl)
            .field("lockout", &self.lockout)
            .field("login_rate_limit", &self.login_rate_limit)
            .field("api_rate_limit", &self.api_rate_limit)
            .field("permission_cache_ttl_secs", &self.permission_cache_ttl_secs)
            .field("csrf_ttl_secs", &self.csrf_ttl_secs)
            .field("device_inactivity_days", &self.device_inactivity_days)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("allow_bootstrap_accounts", &self.allow_bootstrap_accounts)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    /// Load from the default file and `PACTA_` environment variables
    pub fn load() -> SecurityResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from an explicit file, still honouring `PACTA_` overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> SecurityResult<Self> {
        Self::from_sources(path, ENV_PREFIX)
    }

    /// Defaults, then the file, then the environment. A missing file is not an error.
    pub fn from_sources<P: AsRef<Path>>(path: P, env_prefix: &str) -> SecurityResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Same defaults, with a secret. Mostly for tests and tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Check every field; a failure here must stop the process from starting
    pub fn validate(&self) -> SecurityResult<()> {
        self.signing_secret()?;
        self.algorithm()?;
        self.session_ttl()?;
        self.remember_me_ttl()?;

        if self.token_issuer.trim().is_empty() || self.token_audience.trim().is_empty() {
            return Err(config_error("token issuer and audience must not be empty"));
        }
        if self.lockout.max_attempts == 0 || self.lockout.lockout_secs == 0 {
            return Err(config_error("lockout attempts and duration must be positive"));
        }
        for (name, limit) in [
            ("login_rate_limit", &self.login_rate_limit),
            ("api_rate_limit", &self.api_rate_limit),
        ] {
            if limit.points == 0 || limit.window_secs == 0 || limit.block_secs == Some(0) {
                return Err(config_error(format!(
                    "{name}: points, window and block must be positive"
                )));
            }
        }
        if self.permission_cache_ttl_secs == 0
            || self.csrf_ttl_secs == 0
            || self.device_inactivity_days == 0
            || self.sweep_interval_secs == 0
        {
            return Err(config_error("cache, csrf, device and sweep periods must be positive"));
        }
        let periods = [
            ("lockout.lockout_secs", self.lockout.lockout_secs),
            ("lockout.retention_secs", self.lockout.retention_secs),
            ("login_rate_limit.window_secs", self.login_rate_limit.window_secs),
            ("login_rate_limit.block_secs", self.login_rate_limit.block_secs.unwrap_or(0)),
            ("api_rate_limit.window_secs", self.api_rate_limit.window_secs),
            ("api_rate_limit.block_secs", self.api_rate_limit.block_secs.unwrap_or(0)),
            ("permission_cache_ttl_secs", self.permission_cache_ttl_secs),
            ("csrf_ttl_secs", self.csrf_ttl_secs),
            ("device_inactivity_days", self.device_inactivity_days.saturating_mul(24 * 60 * 60)),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, secs)| *secs > MAX_TTL.as_secs()) {
            return Err(config_error(format!("{name} exceeds the 365 day maximum")));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(config_error(format!("unknown log level `{}`", self.log_level)));
        }
        Ok(())
    }

    /// The signing secret, or a configuration error if it is absent or weak
    pub fn signing_secret(&self) -> SecurityResult<&[u8]> {
        match self.jwt_secret.as_deref().map(str::trim) {
            None | Some("") => Err(config_error(
                "jwt_secret is not set (PACTA_JWT_SECRET or pacta-security.toml)",
            )),
            Some(secret) if secret.len() < MIN_SECRET_LEN => Err(config_error(format!(
                "jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            ))),
            Some(secret) => Ok(secret.as_bytes()),
        }
    }

    /// Only HMAC algorithms are accepted; the secret is symmetric.
    pub fn algorithm(&self) -> SecurityResult<Algorithm> {
        match Algorithm::from_str(self.jwt_algorithm.trim()) {
            Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
            _ => Err(config_error(format!(
                "unsupported jwt_algorithm `{}`",
                self.jwt_algorithm
            ))),
        }
    }

    pub fn session_ttl(&self) -> SecurityResult<Duration> {
        parse_ttl(&self.session_ttl)
    }

    pub fn remember_me_ttl(&self) -> SecurityResult<Duration> {
        parse_ttl(&self.remember_me_ttl)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout.lockout_secs)
    }

    pub fn permission_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_secs)
    }

    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl_secs)
    }

    pub fn device_inactivity(&self) -> Duration {
        Duration::from_secs(self.device_inactivity_days.saturating_mul(24 * 60 * 60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Parse a TTL such as `"1h"`, `"30m"` or `"30d"`. Zero and anything past
/// [`MAX_TTL`] are rejected.
pub fn parse_ttl(ttl: &str) -> SecurityResult<Duration> {
    let parsed = humantime::parse_duration(ttl.trim())
        .map_err(|e| config_error(format!("invalid duration `{ttl}`: {e}")))?;
    if parsed.is_zero() {
        return Err(config_error(format!("duration `{ttl}` must be positive")));
    }
    if parsed > MAX_TTL {
        return Err(config_error(format!("duration `{ttl}` exceeds the 365 day maximum")));
    }
    Ok(parsed)
}

fn config_error(msg: impl Into<String>) -> SecurityError {
    SecurityError::Configuration(msg.into())
}
