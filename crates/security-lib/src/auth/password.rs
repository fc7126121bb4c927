// ============================
// crates/security-lib/src/auth/password.rs
// ============================
//! Password hash verification.
//!
//! The directory stores PHC strings; both scrypt and Argon2 hashes verify.
//! Verification is CPU-bound and is run off the async workers by
//! [`verify_password_blocking`].
use argon2::Argon2;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroizing;

use crate::error::SecurityResult;

pub use scrypt::Params as ScryptParams;

/// Hash a password using scrypt with the recommended parameters
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt.hash_password(plain.as_bytes(), &salt)?.to_string();
    Ok(hash)
}

/// Hash with explicit scrypt cost parameters (cheap ones keep tests fast)
pub fn hash_password_with(plain: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a stored PHC hash
///
/// Malformed hashes never verify.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    let verifiers: [&dyn PasswordVerifier; 2] = [&Scrypt, &Argon2::default()];
    parsed_hash
        .verify_password(&verifiers, plain.as_bytes())
        .is_ok()
}

/// Run [`verify_password`] on the blocking pool; the plaintext is wiped afterwards
pub async fn verify_password_blocking(hash: String, plain: Zeroizing<String>) -> SecurityResult<bool> {
    let matched = tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?;
    Ok(matched)
}

#[cfg(test)]
pub(crate) fn cheap_params() -> Params {
    Params::new(4, 8, 1, Params::RECOMMENDED_LEN).expect("valid scrypt params")
}
