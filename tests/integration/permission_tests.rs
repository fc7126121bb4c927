// ==============================
// tests/integration/permission_tests.rs
// ==============================
//! Permission checks through the role cache
use std::time::Duration;

use pacta_common::{Action, LoginRequest};
use pacta_security::{AuthService, PermissionCheck, SecurityError};

use crate::test_utils::*;

#[tokio::test]
async fn test_role_cache_requeries_only_after_ttl() {
    let env = setup_test_env();
    let cache = env.service.permissions();

    cache.get_role_permissions(EDITOR_ROLE).await.unwrap();
    assert_eq!(env.directory.role_lookups(), 1);

    env.clock.advance(Duration::from_secs(5 * 60 - 1));
    cache.get_role_permissions(EDITOR_ROLE).await.unwrap();
    assert_eq!(env.directory.role_lookups(), 1);

    env.clock.advance(Duration::from_millis(1_001));
    cache.get_role_permissions(EDITOR_ROLE).await.unwrap();
    cache.get_role_permissions(EDITOR_ROLE).await.unwrap();
    assert_eq!(env.directory.role_lookups(), 2);
}

#[tokio::test]
async fn test_editor_permissions_by_user_id() {
    let env = setup_test_env();
    let check = |resource, action| PermissionCheck::for_user(EDITOR_ID, resource, action);

    assert!(env.service.check_permission(check("contracts", Action::Read)).await);
    assert!(env.service.check_permission(check("contracts", Action::Write)).await);
    assert!(!env.service.check_permission(check("contracts", Action::Delete)).await);
    assert!(env.service.check_permission(check("documents", Action::Export)).await);
    assert!(!env.service.check_permission(check("documents", Action::Modify)).await);
    assert!(!env.service.check_permission(check("backups", Action::Read)).await);
}

#[tokio::test]
async fn test_permissions_stored_as_json_string() {
    let env = setup_test_env();

    assert!(
        env.service
            .check_permission(PermissionCheck::for_user(VIEWER_ID, "contracts", Action::View))
            .await
    );
    assert!(
        !env.service
            .check_permission(PermissionCheck::for_user(VIEWER_ID, "contracts", Action::Write))
            .await
    );
}

#[tokio::test]
async fn test_admin_role_allows_everything() {
    let env = setup_test_env();

    for resource in ["contracts", "backups", "anything-else"] {
        assert!(
            env.service
                .check_permission(PermissionCheck::for_user(ADMIN_ID, resource, Action::Delete))
                .await
        );
    }
}

#[tokio::test]
async fn test_admin_token_skips_the_directory() {
    let env = setup_test_env();
    let token = env
        .service
        .login(LoginRequest::new("marta@pacta.app", PASSWORD))
        .await
        .unwrap()
        .token;

    let lookups = env.directory.total_lookups();
    assert!(
        env.service
            .check_permission(PermissionCheck::for_token(&token, "users", Action::Execute))
            .await
    );
    assert_eq!(env.directory.total_lookups(), lookups);
}

#[tokio::test]
async fn test_token_path_uses_the_session_user() {
    let env = setup_test_env();
    let token = env
        .service
        .login(LoginRequest::new(VIEWER_EMAIL, PASSWORD).device("desk"))
        .await
        .unwrap()
        .token;

    assert!(
        env.service
            .check_permission(PermissionCheck::for_token(&token, "contracts", Action::Read))
            .await
    );

    env.service.logout(&token);
    assert!(
        !env.service
            .check_permission(PermissionCheck::for_token(&token, "contracts", Action::Read))
            .await
    );
    assert!(
        !env.service
            .check_permission(PermissionCheck::for_token("garbage", "contracts", Action::Read))
            .await
    );
}

#[tokio::test]
async fn test_unknown_and_inactive_users_are_denied() {
    let env = setup_test_env();

    assert!(
        !env.service
            .check_permission(PermissionCheck::for_user("u-nadie", "contracts", Action::Read))
            .await
    );
    assert!(
        !env.service
            .check_permission(PermissionCheck::for_user("u-baja", "contracts", Action::Read))
            .await
    );
}

#[tokio::test]
async fn test_directory_outage_fails_closed() {
    let env = setup_test_env();
    env.directory.set_unavailable(true);

    assert!(
        !env.service
            .check_permission(PermissionCheck::for_user(EDITOR_ID, "contracts", Action::Read))
            .await
    );
    assert!(matches!(
        env.service.permissions().get_role_permissions(EDITOR_ROLE).await,
        Err(SecurityError::Directory(_))
    ));

    env.directory.set_unavailable(false);
    assert!(
        env.service
            .check_permission(PermissionCheck::for_user(EDITOR_ID, "contracts", Action::Read))
            .await
    );
}

#[tokio::test]
async fn test_cache_invalidation_picks_up_role_changes() {
    let env = setup_test_env();
    let check = PermissionCheck::for_user(VIEWER_ID, "reports", Action::Read);
    assert!(!env.service.check_permission(check).await);

    env.directory.insert_role(pacta_security::DirectoryRole {
        id: VIEWER_ROLE.into(),
        name: "Viewer".into(),
        permissions: serde_json::json!({"reports": ["read"]}),
    });
    // Still served from the cache
    assert!(!env.service.check_permission(check).await);

    env.service.permissions().invalidate(VIEWER_ROLE);
    assert!(env.service.check_permission(check).await);
}

#[tokio::test]
async fn test_has_role_matches_exactly() {
    let env = setup_test_env();
    let token = env
        .service
        .login(LoginRequest::new(EDITOR_EMAIL, PASSWORD))
        .await
        .unwrap()
        .token;

    assert!(env.service.has_role(&token, &["Viewer", "Editor"]));
    assert!(!env.service.has_role(&token, &["editor"]));
    assert!(!env.service.has_role(&token, &[]));
    assert!(!env.service.has_role("garbage", &["Editor"]));
}
