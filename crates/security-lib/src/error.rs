// crates/security-lib/src/error.rs

//! Central error type for the security engine.
use std::time::Duration;

use thiserror::Error;

/// Security engine errors with stable codes.
///
/// Display strings are the user-facing messages shown by the desktop shell.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// Bad credentials or inactive account
    #[error("Credenciales inválidas")]
    Authentication,

    #[error("Cuenta bloqueada temporalmente. Intente de nuevo en {} minutos", minutes_ceil(.remaining))]
    LockedOut { remaining: Duration },

    #[error("Demasiados intentos. Intente de nuevo en {} segundos", secs_ceil(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("Token expirado")]
    TokenExpired,

    #[error("Token inválido")]
    TokenInvalid,

    /// Signature verifies but the session was revoked
    #[error("Sesión no encontrada")]
    SessionNotFound,

    #[error("Permiso denegado")]
    PermissionDenied,

    /// Fatal at startup
    #[error("Error de configuración: {0}")]
    Configuration(String),

    /// The external user directory failed
    #[error("Error del directorio de usuarios: {0}")]
    Directory(String),

    #[error("Error interno: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            SecurityError::Authentication => "AUTH_001",
            SecurityError::LockedOut { .. } => "AUTH_002",
            SecurityError::RateLimited { .. } => "AUTH_003",
            SecurityError::TokenExpired => "TOKEN_001",
            SecurityError::TokenInvalid => "TOKEN_002",
            SecurityError::SessionNotFound => "SESSION_001",
            SecurityError::PermissionDenied => "PERM_001",
            SecurityError::Configuration(_) => "CONFIG_001",
            SecurityError::Directory(_) => "DIR_001",
            SecurityError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for the UI
    ///
    /// Internal details of configuration and directory failures stay in the logs.
    pub fn sanitized_message(&self) -> String {
        match self {
            SecurityError::Configuration(_) => "Error de configuración".to_string(),
            SecurityError::Directory(_) | SecurityError::Internal(_) => {
                "Error interno del servidor".to_string()
            },
            other => other.to_string(),
        }
    }

    /// How long the caller should wait before retrying, if the error is throttling
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SecurityError::LockedOut { remaining } => Some(*remaining),
            SecurityError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for SecurityError {
    fn from(err: tokio::task::JoinError) -> Self {
        SecurityError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<figment::Error> for SecurityError {
    fn from(err: figment::Error) -> Self {
        SecurityError::Configuration(err.to_string())
    }
}

fn minutes_ceil(d: &Duration) -> u64 {
    d.as_secs().div_ceil(60).max(1)
}

fn secs_ceil(d: &Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

pub type SecurityResult<T> = Result<T, SecurityError>;
