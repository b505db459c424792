//! Create/get orchestration over the entry store and blob store.

use crate::access::{self, password};
use crate::blob::BlobStore;
use crate::config::{Config, Limits};
use crate::error::AppError;
use crate::ingest::{rollback, AttachmentIngestor};
use crate::keygen::is_plausible_key;
use crate::models::paste::{
    Attachment, AttachmentView, CreatePasteRequest, PasteContent, PasteEntry, Snippet,
};
use crate::store::EntryStore;
use crate::task::run_blocking;
use crate::text::{char_len, normalize_optional_nonempty};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SNIPPET_LANGUAGE: &str = "text";

/// Entry point for creating and reading pastes.
#[derive(Clone)]
pub struct PasteService {
    store: EntryStore,
    blobs: Arc<dyn BlobStore>,
    ingestor: AttachmentIngestor,
    limits: Limits,
    signed_url_ttl: Duration,
}

impl PasteService {
    pub fn new(
        store: EntryStore,
        blobs: Arc<dyn BlobStore>,
        limits: Limits,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            ingestor: AttachmentIngestor::new(blobs.clone(), limits),
            store,
            blobs,
            limits,
            signed_url_ttl,
        }
    }

    /// Build a service with limits and link lifetime taken from `config`.
    pub fn from_config(store: EntryStore, blobs: Arc<dyn BlobStore>, config: &Config) -> Self {
        Self::new(
            store,
            blobs,
            config.limits,
            config.signed_url_ttl(),
        )
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Validate, upload attachments, and persist a new entry.
    ///
    /// # Returns
    /// The retrieval key.
    ///
    /// # Errors
    /// - [`AppError::BadRequest`] for invalid input; nothing is written.
    /// - [`AppError::Upload`] when attachment upload fails (already rolled back).
    /// - Storage errors from the insert; uploaded attachments are deleted.
    pub async fn create(
        &self,
        request: CreatePasteRequest,
        client_origin: &str,
    ) -> Result<String, AppError> {
        let CreatePasteRequest {
            title,
            description,
            snippets,
            files,
            password,
            expire_after,
            once,
        } = request;

        let snippets = self.validate_snippets(snippets)?;
        match (snippets.is_empty(), files.is_empty()) {
            (true, true) => {
                return Err(AppError::BadRequest(
                    "a paste needs snippets or attachments".to_string(),
                ))
            }
            (false, false) => {
                return Err(AppError::BadRequest(
                    "a paste holds either snippets or attachments, not both".to_string(),
                ))
            }
            _ => {}
        }
        let now = Utc::now();
        let expire_at = resolve_expiry(now, expire_after)?;
        let password_hash = match password.filter(|p| !p.is_empty()) {
            Some(plaintext) => {
                Some(run_blocking(move || password::hash_password(&plaintext)).await?)
            }
            None => None,
        };

        let attachments = self.ingestor.ingest(files).await?;

        let mut entry = PasteEntry::new(client_origin);
        entry.title = normalize_optional_nonempty(title);
        entry.description = normalize_optional_nonempty(description);
        entry.snippets = snippets;
        entry.attachments = attachments;
        entry.password_hash = password_hash;
        entry.once = once;
        entry.expire_at = expire_at;

        let blob_refs: Vec<String> = entry.blob_refs().map(str::to_string).collect();
        match self.store.insert(entry) {
            Ok(key) => {
                tracing::debug!(
                    "Created entry {} ({} attachment(s), once={})",
                    key,
                    blob_refs.len(),
                    once
                );
                Ok(key)
            }
            Err(err) => {
                if !blob_refs.is_empty() {
                    tracing::warn!(
                        "Entry insert failed; deleting {} uploaded attachment(s): {}",
                        blob_refs.len(),
                        err
                    );
                    rollback(self.blobs.as_ref(), blob_refs).await;
                }
                Err(err)
            }
        }
    }

    /// Read an entry for a client, consuming it when it is flagged `once`.
    ///
    /// # Errors
    /// - [`AppError::NotFound`] for unknown or already consumed keys.
    /// - [`AppError::WrongPassword`], then [`AppError::ContentExpired`].
    /// - Storage and blob-store failures.
    pub async fn get(&self, key: &str, password: Option<&str>) -> Result<PasteContent, AppError> {
        if !is_plausible_key(key) {
            return Err(AppError::NotFound);
        }
        let entry = self.store.load(key)?;
        let now = Utc::now();
        let (entry, verdict) = if entry.password_hash.is_some() {
            // Argon2 verification is CPU-bound.
            let password = password.map(str::to_string);
            run_blocking(move || {
                let verdict = access::evaluate(&entry, password.as_deref(), now);
                Ok((entry, verdict))
            })
            .await?
        } else {
            let verdict = access::evaluate(&entry, password, now);
            (entry, verdict)
        };

        if !entry.once {
            verdict?;
            let attachments = self.attachment_views(&entry.attachments, None)?;
            return Ok(content_of(entry, attachments));
        }

        // The row is gone already; its blobs go with it whatever the verdict.
        if let Err(err) = verdict {
            tracing::info!("Once entry {} consumed by a rejected read: {}", key, err);
            rollback(
                self.blobs.as_ref(),
                entry.blob_refs().map(str::to_string).collect::<Vec<_>>(),
            )
            .await;
            return Err(err);
        }

        let mut inline = Some(Vec::with_capacity(entry.attachments.len()));
        for attachment in &entry.attachments {
            match self.blobs.fetch(&attachment.blob_ref).await {
                Ok(blob) => {
                    if let Some(inline) = inline.as_mut() {
                        inline.push(blob.bytes);
                    }
                }
                Err(err) => {
                    // Leave the blobs for the sweeper so the signed links
                    // stay usable for their lifetime.
                    tracing::error!(
                        "Failed to fetch blob {} for once entry {}: {}",
                        attachment.blob_ref,
                        key,
                        err
                    );
                    inline = None;
                    break;
                }
            }
        }

        let release = inline.is_some();
        let attachments = self.attachment_views(&entry.attachments, inline)?;
        if release {
            rollback(
                self.blobs.as_ref(),
                entry.blob_refs().map(str::to_string).collect::<Vec<_>>(),
            )
            .await;
        }
        Ok(content_of(entry, attachments))
    }

    fn validate_snippets(&self, snippets: Vec<Snippet>) -> Result<Vec<Snippet>, AppError> {
        if snippets.len() > self.limits.max_snippet_count {
            return Err(AppError::BadRequest(format!(
                "too many snippets: {} (max {})",
                snippets.len(),
                self.limits.max_snippet_count
            )));
        }
        snippets
            .into_iter()
            .enumerate()
            .map(|(index, snippet)| {
                if snippet.content.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "snippet {} is empty",
                        index + 1
                    )));
                }
                let length = char_len(&snippet.content);
                if length > self.limits.max_snippet_length {
                    return Err(AppError::BadRequest(format!(
                        "snippet {} is {} characters long (max {})",
                        index + 1,
                        length,
                        self.limits.max_snippet_length
                    )));
                }
                let language = normalize_optional_nonempty(Some(snippet.language))
                    .unwrap_or_else(|| DEFAULT_SNIPPET_LANGUAGE.to_string());
                Ok(Snippet::new(language, snippet.content))
            })
            .collect()
    }

    fn attachment_views(
        &self,
        attachments: &[Attachment],
        inline: Option<Vec<Vec<u8>>>,
    ) -> Result<Vec<AttachmentView>, AppError> {
        let mut inline = inline.map(Vec::into_iter);
        attachments
            .iter()
            .map(|attachment| {
                let url = self
                    .blobs
                    .signed_url(&attachment.blob_ref, self.signed_url_ttl)?;
                Ok(AttachmentView {
                    filename: attachment.filename.clone(),
                    mime_type: attachment.mime_type.clone(),
                    width: attachment.width,
                    height: attachment.height,
                    size_bytes: attachment.size_bytes,
                    uploaded_at: attachment.uploaded_at,
                    url,
                    inline: inline.as_mut().and_then(Iterator::next),
                })
            })
            .collect()
    }
}

/// Deadline for `expire_after` seconds from `now`; zero or absent means none.
fn resolve_expiry(
    now: DateTime<Utc>,
    expire_after: Option<u64>,
) -> Result<Option<DateTime<Utc>>, AppError> {
    match expire_after {
        None | Some(0) => Ok(None),
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(Some)
            .ok_or_else(|| AppError::BadRequest("expire_after is out of range".to_string())),
    }
}

fn content_of(entry: PasteEntry, attachments: Vec<AttachmentView>) -> PasteContent {
    PasteContent {
        key: entry.key,
        title: entry.title,
        description: entry.description,
        snippets: entry.snippets,
        attachments,
        once: entry.once,
        created_at: entry.created_at,
        expire_at: entry.expire_at,
    }
}

#[cfg(test)]
mod tests;
