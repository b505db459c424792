//! Core domain library for PasteShare (entry lifecycle, storage, blobs).

/// Password and expiry policy evaluation.
pub mod access;
/// Blob store abstraction and the local filesystem implementation.
pub mod blob;
/// Configuration loading and defaults.
pub mod config;
/// Shared default values.
pub mod constants;
/// redb-backed keyed entry storage.
pub mod db;
/// Application error types (storage/domain).
pub mod error;
/// Concurrent attachment ingestion with rollback.
pub mod ingest;
/// Retrieval key generation.
pub mod keygen;
/// Data models for API requests and persistence.
pub mod models;
/// High-level create/get orchestration.
pub mod service;
/// Entry persistence with collision retry and once-read semantics.
pub mod store;
/// Background reconciliation of blobs against live entries.
pub mod sweeper;
/// Blocking-pool offload helper.
mod task;
/// Text normalization helpers.
pub mod text;

#[cfg(test)]
pub(crate) mod test_support;

pub use blob::{BlobStore, LocalBlobStore, UrlSigner};
pub use config::Config;
pub use constants::DEFAULT_PORT;
pub use db::Database;
pub use error::AppError;
pub use service::PasteService;
pub use store::EntryStore;
pub use sweeper::{OrphanSweeper, SweeperHandle};
