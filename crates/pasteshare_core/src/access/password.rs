//! One-way password hashing (Argon2id, PHC string format).

use crate::error::AppError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash `plaintext` with a fresh random salt.
///
/// # Returns
/// A PHC-formatted hash string suitable for persistence.
///
/// # Errors
/// Returns [`AppError::Internal`] if salt encoding or hashing fails.
pub fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|err| {
        tracing::error!("Failed to encode password salt: {}", err);
        AppError::Internal
    })?;
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            tracing::error!("Failed to hash password: {}", err);
            AppError::Internal
        })
}

/// Compare `plaintext` against a stored PHC hash.
///
/// A malformed stored hash never matches.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("Stored password hash is malformed; denying access");
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
