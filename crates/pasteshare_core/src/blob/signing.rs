//! Signed, expiring blob links.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const KEY_CONTEXT: &str = "pasteshare blob url signing v1";

/// Issues and checks `expires`/`sig` query pairs for blob URLs.
///
/// The signature is a keyed BLAKE3 hash over the object key and the expiry
/// timestamp, so a link cannot be retargeted or extended.
#[derive(Clone)]
pub struct UrlSigner {
    key: [u8; 32],
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    /// Derive the signing key from an operator secret.
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    fn mac(&self, object_key: &str, expires: u64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(object_key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hasher.finalize()
    }

    /// Sign `object_key` for `ttl` from now.
    ///
    /// # Returns
    /// `(expires_unix_secs, hex_signature)`.
    pub fn sign(&self, object_key: &str, ttl: Duration) -> (u64, String) {
        let expires = unix_now().saturating_add(ttl.as_secs().max(1));
        (expires, self.mac(object_key, expires).to_hex().to_string())
    }

    /// Check a presented signature at time `now_unix`.
    pub fn verify_at(&self, object_key: &str, expires: u64, sig: &str, now_unix: u64) -> bool {
        if expires < now_unix {
            return false;
        }
        match blake3::Hash::from_hex(sig) {
            // `Hash` equality is constant-time.
            Ok(presented) => presented == self.mac(object_key, expires),
            Err(_) => false,
        }
    }

    /// Check a presented signature against the current clock.
    pub fn verify(&self, object_key: &str, expires: u64, sig: &str) -> bool {
        self.verify_at(object_key, expires, sig, unix_now())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
