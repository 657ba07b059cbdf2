//! Argon2 hashing for user passwords and client secrets.
//!
//! Hashes are stored as PHC strings. Verification compares digests in
//! constant time. Lookups that miss still run one verification against a
//! dummy hash via [`verify_dummy`], so a caller cannot tell an unknown name
//! from a wrong secret by timing.

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{AuthError, AuthResult};

/// Hash a password or client secret using Argon2id.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
///
/// # Example
///
/// ```
/// use stockify_auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("s3cret").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("s3cret", &hash).unwrap());
/// ```
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash.
///
/// Returns `Ok(false)` on mismatch and `Err` only if the stored hash is not
/// a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

/// Verify against a stored hash, treating a corrupt hash as an internal error.
pub(crate) fn verify_stored(password: &str, hash: &str) -> AuthResult<bool> {
    verify_password(password, hash)
        .map_err(|e| AuthError::internal(format!("stored hash is invalid: {e}")))
}

/// Burn one verification against a fixed dummy hash.
pub(crate) fn verify_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let hash = DUMMY_HASH.get_or_init(|| hash_password("stockify-dummy-secret").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

/// [`verify_stored`] on the blocking pool.
///
/// Argon2 verification is CPU and memory bound and must not run on a runtime
/// worker thread.
pub(crate) async fn verify_stored_async(password: &str, hash: &str) -> AuthResult<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || verify_stored(&password, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("password verification task failed: {e}")))?
}

/// [`verify_dummy`] on the blocking pool.
pub(crate) async fn verify_dummy_async(password: &str) {
    let password = password.to_owned();
    if let Err(e) = tokio::task::spawn_blocking(move || verify_dummy(&password)).await {
        tracing::warn!(error = %e, "Dummy verification task failed");
    }
}

/// Hash a configured plaintext secret, or accept a pre-hashed one after
/// checking that it parses.
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] if neither value is usable.
pub fn hash_or_accept(plaintext: Option<&str>, prehashed: Option<&str>) -> AuthResult<String> {
    match (plaintext, prehashed) {
        (Some(plaintext), _) => hash_password(plaintext)
            .map_err(|e| AuthError::configuration(format!("failed to hash secret: {e}"))),
        (None, Some(hash)) => {
            PasswordHash::new(hash)
                .map_err(|e| AuthError::configuration(format!("invalid PHC hash: {e}")))?;
            Ok(hash.to_string())
        }
        (None, None) => Err(AuthError::configuration("no secret configured")),
    }
}
