//! Access policy evaluation for fetched entries.
//!
//! The gate runs a fixed sequence: password first, then expiry. An expired
//! entry fetched with the wrong password reports [`AppError::WrongPassword`].

/// Argon2id password hashing.
pub mod password;

use crate::{error::AppError, models::paste::PasteEntry};
use chrono::{DateTime, Utc};

/// Evaluate `entry` against a supplied plaintext password at time `now`.
///
/// # Returns
/// `Ok(())` when the reader may see the content.
///
/// # Errors
/// - [`AppError::WrongPassword`] when the entry is protected and `password`
///   is missing or does not match.
/// - [`AppError::ContentExpired`] when `expire_at` has passed.
pub fn evaluate(
    entry: &PasteEntry,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(hash) = entry.password_hash.as_deref() {
        let supplied = password.unwrap_or("");
        if !password::verify_password(supplied, hash) {
            return Err(AppError::WrongPassword);
        }
    }

    if entry.is_expired_at(now) {
        return Err(AppError::ContentExpired);
    }

    Ok(())
}
