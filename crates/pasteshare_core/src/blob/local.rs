//! Filesystem blob store.

use super::{
    content_type_for_key, is_valid_object_key, BlobError, BlobStore, FetchedBlob, StoredBlob,
    UrlSigner,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const PART_SUFFIX: &str = ".part";

/// Stores each object as one file under a root directory.
///
/// Writes land in a dot-prefixed temporary file and are renamed into place,
/// so readers and [`BlobStore::list`] never observe partial objects. A
/// cancelled upload can still leave its temporary file behind once the
/// blocking write finishes; [`BlobStore::purge_stale_uploads`] reclaims those.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    signer: UrlSigner,
}

impl LocalBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: &str,
        signer: UrlSigner,
    ) -> Result<Self, BlobError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        if !is_valid_object_key(key) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

fn is_part_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PART_SUFFIX)
}

/// Removes a temporary upload file unless it was renamed into place.
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    fn committed(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        let tmp = PartFile {
            path: self.root.join(format!(
                ".{}.{}{}",
                key,
                Uuid::new_v4().simple(),
                PART_SUFFIX
            )),
            armed: true,
        };

        let mut file = tokio::fs::File::create(&tmp.path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp.path, &path).await?;
        tmp.committed();
        tracing::debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {}", key);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        if !is_valid_object_key(key) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        let (expires, sig) = self.signer.sign(key, ttl);
        Ok(format!(
            "{}/v1/blob/{}?expires={}&sig={}",
            self.public_base_url, key, expires, sig
        ))
    }

    async fn fetch(&self, key: &str) -> Result<FetchedBlob, BlobError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedBlob {
                bytes,
                content_type: Some(content_type_for_key(key).to_string()),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> Result<Vec<StoredBlob>, BlobError> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut blobs = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            // Temporary uploads are dot-prefixed and fail this check.
            if !is_valid_object_key(&name) {
                continue;
            }
            let metadata = match item.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between read_dir and stat.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            blobs.push(StoredBlob {
                key: name,
                last_modified: metadata.modified()?,
            });
        }
        Ok(blobs)
    }

    async fn purge_stale_uploads(&self, older_than: Duration) -> Result<usize, BlobError> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            if !is_part_file(&name) {
                continue;
            }
            let modified = match item.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata.modified()?,
                Ok(_) => continue,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if now.duration_since(modified).unwrap_or(Duration::ZERO) < older_than {
                continue;
            }
            match tokio::fs::remove_file(item.path()).await {
                Ok(()) => {
                    tracing::debug!("Removed stale partial upload {}", name);
                    removed += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }
}
