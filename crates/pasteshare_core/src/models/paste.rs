//! Paste entry data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One piece of text inside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub language: String,
    pub content: String,
}

impl Snippet {
    pub fn new(language: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            content: content.into(),
        }
    }
}

/// Descriptor of an uploaded blob attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Name the client uploaded the file under.
    pub filename: String,
    /// Object key inside the blob store.
    pub blob_ref: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Stored paste entry.
///
/// `password_hash` and `client_origin` never leave the core; readers get a
/// [`PasteContent`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteEntry {
    pub key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub password_hash: Option<String>,
    pub client_origin: String,
    #[serde(default)]
    pub once: bool,
    pub created_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
}

impl PasteEntry {
    /// Create an unkeyed entry; the key and `created_at` are assigned on insert.
    pub fn new(client_origin: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            title: None,
            description: None,
            snippets: Vec::new(),
            attachments: Vec::new(),
            password_hash: None,
            client_origin: client_origin.into(),
            once: false,
            created_at: Utc::now(),
            expire_at: None,
        }
    }

    /// Whether the entry's deadline has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.map(|deadline| deadline <= now).unwrap_or(false)
    }

    /// Object keys of every attachment.
    pub fn blob_refs(&self) -> impl Iterator<Item = &str> {
        self.attachments.iter().map(|a| a.blob_ref.as_str())
    }
}

/// A file submitted for attachment, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes,
        }
    }
}

/// Request payload for creating an entry.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePasteRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(skip)]
    pub files: Vec<IncomingFile>,
    pub password: Option<String>,
    /// Seconds until the entry expires; `0` or absent means never.
    pub expire_after: Option<u64>,
    #[serde(default)]
    pub once: bool,
}

/// Query parameters for fetching an entry.
#[derive(Debug, Default, Deserialize)]
pub struct GetPasteQuery {
    pub password: Option<String>,
}

/// Attachment as returned to a reader.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub filename: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Short-lived signed link to the blob.
    pub url: String,
    /// Blob bytes, only present for once-read entries whose blobs are
    /// deleted as part of the read.
    #[serde(skip)]
    pub inline: Option<Vec<u8>>,
}

/// Reader-facing content of an entry.
#[derive(Debug, Clone, Serialize)]
pub struct PasteContent {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub snippets: Vec<Snippet>,
    pub attachments: Vec<AttachmentView>,
    pub once: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}
