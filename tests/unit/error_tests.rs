// ==============================
// tests/unit/error_tests.rs
// ==============================
use std::time::Duration;

use pacta_security::SecurityError;

#[test]
fn test_error_codes() {
    assert_eq!(SecurityError::Authentication.error_code(), "AUTH_001");
    assert_eq!(
        SecurityError::LockedOut {
            remaining: Duration::from_secs(60)
        }
        .error_code(),
        "AUTH_002"
    );
    assert_eq!(SecurityError::TokenExpired.error_code(), "TOKEN_001");
    assert_eq!(SecurityError::TokenInvalid.error_code(), "TOKEN_002");
    assert_eq!(SecurityError::SessionNotFound.error_code(), "SESSION_001");
    assert_eq!(SecurityError::PermissionDenied.error_code(), "PERM_001");
}

#[test]
fn test_throttling_errors_carry_retry_hint() {
    let limited = SecurityError::RateLimited {
        retry_after: Duration::from_secs(1_800),
    };
    assert_eq!(limited.retry_after(), Some(Duration::from_secs(1_800)));
    assert!(limited.to_string().contains("1800 segundos"));
    assert_eq!(SecurityError::TokenInvalid.retry_after(), None);
}

#[test]
fn test_sanitized_messages_hide_internals() {
    let err = SecurityError::Directory("connection refused to 10.0.0.3:5432".into());
    assert!(!err.sanitized_message().contains("10.0.0.3"));
    assert_eq!(
        SecurityError::TokenExpired.sanitized_message(),
        SecurityError::TokenExpired.to_string()
    );
}
