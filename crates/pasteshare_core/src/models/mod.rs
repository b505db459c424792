//! Data models for requests, responses, and persisted rows.

/// Paste entry models.
pub mod paste;
