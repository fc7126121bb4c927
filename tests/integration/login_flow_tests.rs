// ==============================
// tests/integration/login_flow_tests.rs
// ==============================
//! Login state machine: lockout, rate limiting, credentials, token issuance
use std::time::Duration;

use pacta_common::{Action, LoginRequest};
use pacta_security::{
    auth::TokenIssuer, config::Settings, AuthService, SecurityError, SecurityEvent,
};

use crate::test_utils::*;

#[tokio::test]
async fn test_login_token_lifetime_matches_ttl() {
    let env = setup_test_env();

    let normal = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).device("laptop"))
        .await
        .unwrap();
    let claims = TokenIssuer::decode_unsafe(&normal.token).unwrap();
    assert!((claims.exp - claims.iat - 8 * 3_600).abs() <= 1);
    assert_eq!(normal.expires_at, claims.exp);

    let remembered = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).remember_me(true).device("phone"))
        .await
        .unwrap();
    let claims = TokenIssuer::decode_unsafe(&remembered.token).unwrap();
    assert!((claims.exp - claims.iat - 30 * 86_400).abs() <= 1);
}

#[tokio::test]
async fn test_device_id_is_stable_across_refresh() {
    let env = setup_test_env();
    let login = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).device("laptop"))
        .await
        .unwrap();

    env.clock.advance(Duration::from_secs(7 * 3_600 + 30 * 60));
    let refreshed = env.service.refresh_token(&login.token).unwrap();
    assert!(refreshed.renewed);

    let token = refreshed.token.unwrap();
    let claims = TokenIssuer::decode_unsafe(&token).unwrap();
    assert_eq!(claims.device_id.as_deref(), Some("laptop"));
    assert_eq!(
        env.service.verify_token(&token).unwrap().device_id.as_deref(),
        Some("laptop")
    );
}

#[tokio::test]
async fn test_lockout_after_five_failures_then_recovery() {
    let env = setup_test_env();

    for _ in 0..5 {
        let err = env
            .service
            .login(LoginRequest::new(EDITOR_EMAIL, "wrong").from_ip("10.0.0.9"))
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::Authentication));
    }

    // Correct credentials do not help while locked
    let err = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).from_ip("10.0.0.9"))
        .await
        .unwrap_err();
    match err {
        SecurityError::LockedOut { remaining } => assert_eq!(remaining, Duration::from_secs(900)),
        other => panic!("expected lockout, got {other:?}"),
    }

    env.clock.advance(Duration::from_secs(15 * 60));
    env.service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).from_ip("10.0.0.9"))
        .await
        .unwrap();
    assert_eq!(env.service.lockout().failure_count(EDITOR_EMAIL), 0);
}

#[tokio::test]
async fn test_lockout_key_ignores_case_and_whitespace() {
    let env = setup_test_env();
    for email in ["ANA@pacta.app", " ana@PACTA.app ", "Ana@Pacta.App"] {
        let _ = env.service.login(LoginRequest::new(email, "wrong")).await;
    }
    assert_eq!(env.service.lockout().failure_count(EDITOR_EMAIL), 3);
}

#[tokio::test]
async fn test_rate_limit_rejection_counts_as_failure() {
    let mut settings = test_settings();
    settings.lockout.max_attempts = 100;
    let env = setup_test_env_with(settings);

    for _ in 0..5 {
        let _ = env
            .service
            .login(LoginRequest::new(EDITOR_EMAIL, "wrong").from_ip("10.0.0.9"))
            .await;
    }

    let err = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).from_ip("10.0.0.9"))
        .await
        .unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30 * 60)));
    assert_eq!(env.service.lockout().failure_count(EDITOR_EMAIL), 6);

    // The limiter is keyed by address as well
    env.service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD).from_ip("10.0.0.10"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_successful_login_resets_the_limiter() {
    let env = setup_test_env();
    for _ in 0..3 {
        for _ in 0..4 {
            let _ = env.service.login(LoginRequest::new(EDITOR_EMAIL, "wrong")).await;
        }
        env.service
            .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_inactive_and_unknown_users_are_rejected() {
    let env = setup_test_env();
    let mut events = env.service.subscribe();

    let err = env
        .service
        .login(LoginRequest::new(INACTIVE_EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SecurityError::Authentication));

    let err = env
        .service
        .login(LoginRequest::new("nadie@pacta.app", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SecurityError::Authentication));

    let mut reasons = Vec::new();
    while let Ok(SecurityEvent::LoginFailed { reason, .. }) = events.try_recv() {
        reasons.push(reason);
    }
    assert_eq!(reasons, ["inactive_account", "unknown_user"]);
}

#[tokio::test]
async fn test_bootstrap_admin_skips_the_directory() {
    let mut settings = Settings::with_secret(TEST_SECRET);
    settings.allow_bootstrap_accounts = true;
    let env = setup_test_env_with(settings);

    let response = env
        .service
        .login(LoginRequest::new("admin@pacta.app", "pacta"))
        .await
        .unwrap();

    assert_eq!(env.directory.total_lookups(), 0);
    assert_eq!(response.user.role, "Admin");
    for action in [Action::Read, Action::Write, Action::Delete] {
        assert!(response.user.permissions.allows("contracts", action));
    }
    assert!(env.service.verify_token(&response.token).is_ok());
}

#[tokio::test]
async fn test_bootstrap_admin_still_locks_out() {
    let mut settings = Settings::with_secret(TEST_SECRET);
    settings.allow_bootstrap_accounts = true;
    let env = setup_test_env_with(settings);

    for _ in 0..5 {
        let _ = env
            .service
            .login(LoginRequest::new("admin@pacta.app", "wrong"))
            .await;
    }
    let err = env
        .service
        .login(LoginRequest::new("admin@pacta.app", "pacta"))
        .await
        .unwrap_err();
    assert!(matches!(err, SecurityError::LockedOut { .. }));
}
