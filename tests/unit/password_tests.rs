// ==============================
// tests/unit/password_tests.rs
// ==============================
use pacta_security::auth::password::{verify_password, verify_password_blocking};
use zeroize::Zeroizing;

use crate::test_utils::cheap_hash;

#[test]
fn test_password_hashing() {
    let hash = cheap_hash("SecureP@ssw0rd");

    // Verify hash format
    assert!(hash.starts_with("$scrypt$"));

    // Verify correct password
    assert!(verify_password(&hash, "SecureP@ssw0rd"));

    // Verify incorrect password
    assert!(!verify_password(&hash, "WrongP@ssw0rd"));
}

#[test]
fn test_same_password_different_salts() {
    let first = cheap_hash("contrato");
    let second = cheap_hash("contrato");
    assert_ne!(first, second);
    assert!(verify_password(&first, "contrato"));
    assert!(verify_password(&second, "contrato"));
}

#[tokio::test]
async fn test_verification_off_the_async_workers() {
    let hash = cheap_hash("clave");
    let results = tokio::join!(
        verify_password_blocking(hash.clone(), Zeroizing::new("clave".to_string())),
        verify_password_blocking(hash.clone(), Zeroizing::new("otra".to_string())),
        verify_password_blocking("garbage".to_string(), Zeroizing::new("clave".to_string())),
    );
    assert!(results.0.unwrap());
    assert!(!results.1.unwrap());
    assert!(!results.2.unwrap());
}
