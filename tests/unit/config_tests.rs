// ==============================
// tests/unit/config_tests.rs
// ==============================
use std::time::Duration;

use pacta_security::{config::Settings, SecurityError};
use tempfile::tempdir;

#[test]
fn test_file_and_env_layering() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("pacta-security.toml");
    std::fs::write(
        &config_path,
        r#"
        jwt_secret = "file-secret-file-secret-file-secret!"
        jwt_algorithm = "HS512"
        remember_me_ttl = "14d"

        [lockout]
        max_attempts = 3
        "#,
    )
    .unwrap();

    std::env::set_var("PACTA_SUITE_LOCKOUT__LOCKOUT_SECS", "60");

    let settings = Settings::from_sources(&config_path, "PACTA_SUITE_").unwrap();
    assert_eq!(settings.jwt_algorithm, "HS512");
    assert_eq!(settings.remember_me_ttl().unwrap(), Duration::from_secs(14 * 86_400));
    assert_eq!(settings.lockout.max_attempts, 3);
    assert_eq!(settings.lockout_duration(), Duration::from_secs(60));
    assert_eq!(settings.lockout.retention_secs, 86_400);
}

#[test]
fn test_secret_from_env_only() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("absent.toml");

    std::env::set_var("PACTA_SUITE_ENV_JWT_SECRET", "env-secret-env-secret-env-secret-!!");
    let settings = Settings::from_sources(&config_path, "PACTA_SUITE_ENV_").unwrap();
    assert_eq!(
        settings.signing_secret().unwrap(),
        b"env-secret-env-secret-env-secret-!!"
    );
}

#[test]
fn test_short_secret_is_configuration_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("short.toml");
    std::fs::write(&config_path, "jwt_secret = \"too-short\"\n").unwrap();

    let err = Settings::from_sources(&config_path, "PACTA_SUITE_SHORT_").unwrap_err();
    assert!(matches!(err, SecurityError::Configuration(_)));
    assert_eq!(err.error_code(), "CONFIG_001");
}

#[test]
fn test_service_refuses_oversized_session_ttl() {
    let mut settings = Settings::with_secret("0123456789abcdef0123456789abcdef");
    settings.session_ttl = "1000000000y".into();

    let result = pacta_security::SecurityService::new(
        settings,
        pacta_security::MemoryDirectory::shared(),
    );
    assert!(matches!(result, Err(SecurityError::Configuration(_))));
}
