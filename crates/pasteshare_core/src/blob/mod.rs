//! Blob storage for entry attachments.
//!
//! One [`BlobStore`] trait object is chosen at startup and shared by the
//! ingestor, the read path and the sweeper.

/// Filesystem-backed store.
pub mod local;
/// Keyed-hash URL signing.
pub mod signing;

pub use local::LocalBlobStore;
pub use signing::UrlSigner;

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by blob store implementations.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob store error: {0}")]
    Backend(String),
}

/// Object listed by [`BlobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    /// Last write time; the sweeper leaves recently written blobs alone.
    pub last_modified: SystemTime,
}

/// Downloaded object.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Object storage used for attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), BlobError>;

    /// Remove `key`. A missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Time-limited read link for `key`.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;

    /// Download `key`.
    async fn fetch(&self, key: &str) -> Result<FetchedBlob, BlobError>;

    /// Every object currently in the store.
    async fn list(&self) -> Result<Vec<StoredBlob>, BlobError>;

    /// Remove partial uploads last written more than `older_than` ago.
    ///
    /// Stores whose uploads are atomic have nothing to reclaim.
    async fn purge_stale_uploads(&self, _older_than: Duration) -> Result<usize, BlobError> {
        Ok(0)
    }
}

/// Fresh object key: `{unix_nanos}_{uuid-simple}{ext}`.
///
/// `ext` includes its leading dot (`".png"`) or is empty.
pub fn object_key(ext: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}_{}{}", nanos, Uuid::new_v4().simple(), ext)
}

/// Whether `key` is safe to use as a single path component.
pub fn is_valid_object_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

/// MIME type for an object key, derived from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match crate::text::lowercase_extension(key).as_deref() {
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".png") => "image/png",
        Some(".gif") => "image/gif",
        Some(".webp") => "image/webp",
        Some(".svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
