// ==============================
// tests/integration/session_tests.rs
// ==============================
//! Session lifecycle: refresh, revocation, logout and events
use std::time::Duration;

use pacta_common::LoginRequest;
use pacta_security::{
    auth::TokenIssuer, AuthService, InvalidationReason, SecurityError, SecurityEvent,
};

use crate::test_utils::*;

async fn login_on(env: &TestEnv, email: &str, device: &str) -> String {
    env.service
        .login(LoginRequest::new(email, PASSWORD).device(device))
        .await
        .unwrap()
        .token
}

#[tokio::test]
async fn test_refresh_far_from_expiry_returns_same_token() {
    let env = setup_test_env();
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    env.clock.advance(Duration::from_secs(6 * 3_600));
    let response = env.service.refresh_token(&token).unwrap();

    assert!(response.valid);
    assert!(!response.renewed);
    assert_eq!(response.token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn test_refresh_near_expiry_keeps_original_span() {
    let env = setup_test_env();
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    env.clock.advance(Duration::from_secs(7 * 3_600 + 45 * 60));
    let response = env.service.refresh_token(&token).unwrap();
    assert!(response.renewed);

    let renewed = response.token.unwrap();
    let claims = TokenIssuer::decode_unsafe(&renewed).unwrap();
    assert_eq!(claims.span_secs(), 8 * 3_600);
    assert_eq!(response.expires_at, Some(claims.exp));

    // The renewed token is the live one for the device
    assert!(env.service.verify_token(&renewed).is_ok());
    let session = env.service.sessions().get("laptop").unwrap();
    assert_eq!(session.token, renewed);
}

#[tokio::test]
async fn test_refresh_of_short_session_is_clamped_to_an_hour() {
    let mut settings = test_settings();
    settings.session_ttl = "30m".into();
    let env = setup_test_env_with(settings);
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    let response = env.service.refresh_token(&token).unwrap();
    assert!(response.renewed);

    let claims = TokenIssuer::decode_unsafe(&response.token.unwrap()).unwrap();
    assert_eq!(claims.span_secs(), 3_600);
}

#[tokio::test]
async fn test_pre_renewal_token_is_spent() {
    let env = setup_test_env();
    let original = login_on(&env, EDITOR_EMAIL, "laptop").await;

    env.clock.advance(Duration::from_secs(7 * 3_600 + 30 * 60));
    let renewed = env.service.refresh_token(&original).unwrap().token.unwrap();
    assert_ne!(renewed, original);

    assert!(matches!(
        env.service.verify_token(&original),
        Err(SecurityError::SessionNotFound)
    ));
    assert!(env.service.refresh_token(&original).is_err());
    assert!(env.service.generate_csrf_token(&original).is_err());

    // Logging out with the spent token leaves the renewed session alone
    assert!(env.service.logout(&original));
    assert!(env.service.verify_token(&renewed).is_ok());
}

#[tokio::test]
async fn test_replaced_token_no_longer_authenticates() {
    let env = setup_test_env();
    let first = login_on(&env, EDITOR_EMAIL, "laptop").await;
    env.clock.advance(Duration::from_secs(5));
    let second = login_on(&env, EDITOR_EMAIL, "laptop").await;

    assert!(matches!(
        env.service.verify_token(&first),
        Err(SecurityError::SessionNotFound)
    ));
    assert!(env.service.generate_csrf_token(&first).is_err());
    assert!(!env.service.has_role(&first, &["Editor"]));

    assert!(env.service.logout(&first));
    assert!(env.service.verify_token(&second).is_ok());
}

#[tokio::test]
async fn test_expired_token_cannot_refresh() {
    let env = setup_test_env();
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    env.clock.advance(Duration::from_secs(8 * 3_600 + 1));
    assert!(matches!(
        env.service.refresh_token(&token),
        Err(SecurityError::TokenExpired)
    ));

    let response = env.service.refresh_token_response(&token);
    assert!(!response.valid);
    assert!(!response.renewed);
    assert_eq!(response.error.as_deref(), Some("Token expirado"));
}

#[tokio::test]
async fn test_invalidate_user_sessions_keeps_the_excepted_device() {
    let env = setup_test_env();
    let laptop = login_on(&env, EDITOR_EMAIL, "laptop").await;
    let phone = login_on(&env, EDITOR_EMAIL, "phone").await;
    let tablet = login_on(&env, EDITOR_EMAIL, "tablet").await;
    let other_user = login_on(&env, VIEWER_EMAIL, "desk").await;

    env.service.invalidate_user_sessions(EDITOR_ID, Some("laptop"));

    assert!(env.service.verify_token(&laptop).is_ok());
    for token in [&phone, &tablet] {
        let verification = env.service.verify_token_response(token);
        assert!(!verification.valid);
        assert_eq!(verification.error.as_deref(), Some("Sesión no encontrada"));
    }
    assert!(env.service.verify_token(&other_user).is_ok());
    assert_eq!(env.service.sessions().sessions_for_user(EDITOR_ID).len(), 1);
}

#[tokio::test]
async fn test_invalidate_user_sessions_without_exception() {
    let env = setup_test_env();
    let laptop = login_on(&env, EDITOR_EMAIL, "laptop").await;
    let phone = login_on(&env, EDITOR_EMAIL, "phone").await;

    env.service.invalidate_user_sessions(EDITOR_ID, None);

    assert!(env.service.verify_token(&laptop).is_err());
    assert!(env.service.verify_token(&phone).is_err());
    assert!(env.service.sessions().is_empty());
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let env = setup_test_env();
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    assert!(env.service.logout(&token));
    assert!(matches!(
        env.service.verify_token(&token),
        Err(SecurityError::SessionNotFound)
    ));
    assert!(env.service.sessions().get("laptop").is_none());
}

#[tokio::test]
async fn test_logout_accepts_expired_but_rejects_forged_tokens() {
    let env = setup_test_env();
    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;

    assert!(!env.service.logout("not-a-jwt"));
    let mut forged = token.clone();
    forged.push('x');
    assert!(!env.service.logout(&forged));

    env.clock.advance(Duration::from_secs(9 * 3_600));
    assert!(env.service.logout(&token));
}

#[tokio::test]
async fn test_stale_logout_leaves_the_new_owner_alone() {
    let env = setup_test_env();
    let editor = login_on(&env, EDITOR_EMAIL, "shared").await;
    let viewer = login_on(&env, VIEWER_EMAIL, "shared").await;

    // The editor's session on the shared device was replaced by the viewer's
    assert!(env.service.logout(&editor));
    assert!(env.service.verify_token(&viewer).is_ok());
    assert_eq!(env.service.sessions().get("shared").unwrap().user_id, VIEWER_ID);
}

#[tokio::test]
async fn test_session_events_are_published() {
    let env = setup_test_env();
    let mut events = env.service.subscribe();

    let token = login_on(&env, EDITOR_EMAIL, "laptop").await;
    login_on(&env, EDITOR_EMAIL, "phone").await;
    env.service.invalidate_user_sessions(EDITOR_ID, Some("laptop"));
    env.service.logout(&token);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(seen.contains(&SecurityEvent::LoginSucceeded {
        user_id: EDITOR_ID.into(),
        device_id: "laptop".into(),
    }));
    assert!(seen.contains(&SecurityEvent::SessionInvalidated {
        user_id: EDITOR_ID.into(),
        device_id: "phone".into(),
        reason: InvalidationReason::UserWide,
    }));
    assert!(seen.contains(&SecurityEvent::SessionInvalidated {
        user_id: EDITOR_ID.into(),
        device_id: "laptop".into(),
        reason: InvalidationReason::Logout,
    }));
}

#[tokio::test]
async fn test_last_login_is_recorded() {
    let env = setup_test_env();
    assert!(env.directory.last_login(EDITOR_ID).is_none());
    login_on(&env, EDITOR_EMAIL, "laptop").await;
    assert!(env.directory.last_login(EDITOR_ID).is_some());
}
