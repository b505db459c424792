//! Application error types for core storage and domain logic.
use thiserror::Error;

/// Top-level application error type.
///
/// Variants follow the public failure taxonomy: `BadRequest` is rejected
/// input, `Database`/`StorageMessage`/`Serialization` are storage failures and
/// `Upload` is a blob-store failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Not found")]
    NotFound,

    #[error("incorrect password")]
    WrongPassword,

    #[error("the requested content has expired")]
    ContentExpired,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}

impl From<crate::blob::BlobError> for AppError {
    fn from(value: crate::blob::BlobError) -> Self {
        match value {
            crate::blob::BlobError::NotFound(_) => Self::NotFound,
            other => Self::Upload(other.to_string()),
        }
    }
}
