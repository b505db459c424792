//! Retrieval key generation.
//!
//! Keys are random and fixed length. Uniqueness is not guaranteed here;
//! [`crate::store::EntryStore::insert`] retries on collision.

use crate::constants::KEY_LENGTH;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Source of candidate retrieval keys.
pub trait KeyGenerator: Send + Sync {
    /// Produce a fresh candidate key.
    fn generate(&self) -> String;
}

/// Default generator: `KEY_LENGTH` characters drawn from `[0-9A-Za-z]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        generate_key(KEY_LENGTH)
    }
}

/// Generate a URL-safe random key of `len` characters.
///
/// # Returns
/// A string containing only ASCII letters and digits.
pub fn generate_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Whether `key` has the shape produced by [`RandomKeyGenerator`].
///
/// Used to reject obviously bogus lookups before touching storage.
pub fn is_plausible_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 64 && key.bytes().all(|b| b.is_ascii_alphanumeric())
}
