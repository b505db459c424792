//! Concurrent attachment ingestion with all-or-nothing rollback.
//!
//! Every file is validated before the first upload starts. Uploads then run
//! one task per file under a detached coordinator; if any upload fails, or
//! the caller stops waiting, every object this request may have written is
//! deleted.

/// Pre-upload checks.
pub mod validate;

use crate::blob::{object_key, BlobStore};
use crate::config::Limits;
use crate::error::AppError;
use crate::models::paste::{Attachment, IncomingFile};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use validate::ValidatedFile;

/// Uploads a request's files to the blob store.
#[derive(Clone)]
pub struct AttachmentIngestor {
    blobs: Arc<dyn BlobStore>,
    limits: Limits,
}

/// Signals the coordinator when the awaiting caller goes away.
struct AbandonGuard {
    cancel: Option<watch::Sender<bool>>,
}

impl AbandonGuard {
    fn disarm(mut self) {
        self.cancel = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
        }
    }
}

struct PlannedUpload {
    object_key: String,
    file: ValidatedFile,
}

impl AttachmentIngestor {
    pub fn new(blobs: Arc<dyn BlobStore>, limits: Limits) -> Self {
        Self { blobs, limits }
    }

    /// Validate and upload `files`.
    ///
    /// # Returns
    /// One [`Attachment`] per file, in no particular order. An empty input
    /// yields an empty output without touching the blob store.
    ///
    /// # Errors
    /// - [`AppError::BadRequest`] when any file fails validation; nothing is
    ///   uploaded.
    /// - [`AppError::Upload`] when any upload fails; uploads that did succeed
    ///   are deleted before returning.
    pub async fn ingest(&self, files: Vec<IncomingFile>) -> Result<Vec<Attachment>, AppError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let validated = validate::validate_all(files, &self.limits)?;
        let planned: Vec<PlannedUpload> = validated
            .into_iter()
            .map(|file| PlannedUpload {
                object_key: object_key(&file.extension),
                file,
            })
            .collect();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let guard = AbandonGuard {
            cancel: Some(cancel_tx),
        };
        let coordinator = tokio::spawn(coordinate(self.blobs.clone(), planned, cancel_rx));

        let outcome = coordinator.await.map_err(|err| {
            tracing::error!("Attachment upload coordinator failed: {}", err);
            AppError::Internal
        })?;
        guard.disarm();
        outcome
    }
}

/// Fan out uploads, collect results, and roll back on failure or abandonment.
async fn coordinate(
    blobs: Arc<dyn BlobStore>,
    planned: Vec<PlannedUpload>,
    mut cancel: watch::Receiver<bool>,
) -> Result<Vec<Attachment>, AppError> {
    let written_keys: Vec<String> = planned.iter().map(|p| p.object_key.clone()).collect();
    let accepted: Arc<Mutex<Vec<Attachment>>> =
        Arc::new(Mutex::new(Vec::with_capacity(planned.len())));
    let (error_tx, mut error_rx) = mpsc::channel::<String>(planned.len());

    let mut workers = JoinSet::new();
    for upload in planned {
        let blobs = blobs.clone();
        let accepted = accepted.clone();
        let error_tx = error_tx.clone();
        workers.spawn(async move {
            let PlannedUpload { object_key, file } = upload;
            let size_bytes = file.bytes.len() as u64;
            match blobs.upload(&object_key, file.bytes, file.mime_type).await {
                Ok(()) => {
                    let attachment = Attachment {
                        filename: file.filename,
                        blob_ref: object_key,
                        mime_type: file.mime_type.to_string(),
                        width: file.width,
                        height: file.height,
                        size_bytes,
                        uploaded_at: Utc::now(),
                    };
                    if let Ok(mut accepted) = accepted.lock() {
                        accepted.push(attachment);
                    }
                }
                Err(err) => {
                    let _ = error_tx
                        .send(format!("upload of '{}' failed: {}", file.filename, err))
                        .await;
                }
            }
        });
    }
    drop(error_tx);

    let mut abandoned = false;
    let mut panicked = false;
    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    if !err.is_cancelled() {
                        tracing::error!("Attachment upload task panicked: {}", err);
                        panicked = true;
                    }
                }
                None => break,
            },
            _ = cancel.changed(), if !abandoned => {
                abandoned = true;
                workers.abort_all();
            }
        }
    }

    let mut failures = Vec::new();
    while let Ok(message) = error_rx.try_recv() {
        failures.push(message);
    }

    if abandoned || panicked || !failures.is_empty() {
        if abandoned {
            tracing::warn!(
                "Attachment upload abandoned by caller; rolling back {} object(s)",
                written_keys.len()
            );
        } else {
            tracing::warn!(
                "Attachment upload failed ({} error(s)); rolling back {} object(s)",
                failures.len().max(1),
                written_keys.len()
            );
        }
        // Aborted tasks may have written their object, so every planned key
        // is deleted, not only the accepted ones.
        rollback(blobs.as_ref(), written_keys).await;
        return Err(AppError::Upload(failures.into_iter().next().unwrap_or_else(
            || {
                if abandoned {
                    "upload abandoned".to_string()
                } else {
                    "upload task failed".to_string()
                }
            },
        )));
    }

    let mut accepted = accepted.lock().map_err(|_| AppError::Internal)?;
    Ok(std::mem::take(&mut *accepted))
}

/// Best-effort delete of `keys`.
///
/// Failures are logged; the orphan sweeper reclaims anything left behind.
pub async fn rollback(blobs: &dyn BlobStore, keys: impl IntoIterator<Item = String>) {
    for key in keys {
        if let Err(err) = blobs.delete(&key).await {
            tracing::error!("Failed to delete blob {} during rollback: {}", key, err);
        }
    }
}
