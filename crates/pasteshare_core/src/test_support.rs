//! Shared fixtures for core unit tests.

use crate::blob::{BlobError, BlobStore, FetchedBlob, StoredBlob};
use crate::db::Database;
use crate::keygen::KeyGenerator;
use crate::store::EntryStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub(crate) fn temp_database() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::new(dir.path().join("db").to_str().unwrap()).unwrap();
    (db, dir)
}

pub(crate) fn entry_store(db: &Database) -> EntryStore {
    EntryStore::new(Arc::new(db.entries.clone()))
}

/// Hands out a fixed sequence of keys, then falls back to a counter.
pub(crate) struct ScriptedKeys {
    queue: Mutex<VecDeque<String>>,
    fallback: AtomicUsize,
}

impl ScriptedKeys {
    pub(crate) fn new(keys: &[&str]) -> Self {
        Self {
            queue: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
            fallback: AtomicUsize::new(0),
        }
    }
}

impl KeyGenerator for ScriptedKeys {
    fn generate(&self) -> String {
        if let Some(key) = self.queue.lock().unwrap().pop_front() {
            return key;
        }
        format!("fallback{}", self.fallback.fetch_add(1, Ordering::SeqCst))
    }
}

/// Encode a `width`x`height` PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Png)
}

/// Encode a `width`x`height` GIF.
pub(crate) fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, image::ImageFormat::Gif)
}

fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    last_modified: SystemTime,
}

/// In-memory [`BlobStore`] with failure injection.
#[derive(Default)]
pub(crate) struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    /// 1-based upload call that fails.
    fail_upload_call: Option<usize>,
    fail_fetch: bool,
    upload_delay: Option<Duration>,
    /// Uploads up to this call number skip the delay.
    delay_after: usize,
}

impl MemoryBlobStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_upload(call: usize) -> Self {
        Self {
            fail_upload_call: Some(call),
            ..Self::default()
        }
    }

    /// Upload calls after the first `fast_calls` sleep for `delay`.
    pub(crate) fn slow_after(fast_calls: usize, delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            delay_after: fast_calls,
            ..Self::default()
        }
    }

    pub(crate) fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::default()
        }
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub(crate) fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Insert an object directly with a backdated modification time.
    pub(crate) fn put_aged(&self, key: &str, age: Duration) {
        let last_modified = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes: vec![0],
                content_type: "image/png".to_string(),
                last_modified,
            },
        );
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.upload_delay.filter(|_| call > self.delay_after) {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upload_call == Some(call) {
            return Err(BlobError::Backend(format!("injected failure on upload {call}")));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        Ok(format!("memory://{}?ttl={}", key, ttl.as_secs()))
    }

    async fn fetch(&self, key: &str) -> Result<FetchedBlob, BlobError> {
        if self.fail_fetch {
            return Err(BlobError::Backend("injected fetch failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|obj| FetchedBlob {
                bytes: obj.bytes.clone(),
                content_type: Some(obj.content_type.clone()),
            })
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn list(&self) -> Result<Vec<StoredBlob>, BlobError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, obj)| StoredBlob {
                key: key.clone(),
                last_modified: obj.last_modified,
            })
            .collect())
    }
}
