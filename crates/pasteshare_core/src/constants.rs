//! Shared constants used across PasteShare crates.

/// Default API port for PasteShare.
pub const DEFAULT_PORT: u16 = 38420;

/// Default maximum characters per snippet.
pub const DEFAULT_MAX_SNIPPET_LENGTH: usize = 30_000;
/// Default maximum snippets per entry.
pub const DEFAULT_MAX_SNIPPET_COUNT: usize = 10;
/// Default maximum size of one attachment in bytes.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
/// Default maximum attachments per entry.
pub const DEFAULT_MAX_ATTACHMENT_COUNT: usize = 3;

/// Default seconds between orphan sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;
/// Blobs younger than this are never reaped by the sweeper.
pub const DEFAULT_SWEEP_GRACE_SECS: u64 = 600;
/// Lifetime of signed blob URLs handed to readers.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 300;

/// Length of generated retrieval keys.
pub const KEY_LENGTH: usize = 16;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "entries.redb";
