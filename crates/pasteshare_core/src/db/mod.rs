//! Database layer for PasteShare entries.

/// Entry table accessors.
pub mod entries;
/// redb table definitions.
pub mod tables;
mod time_util;

use crate::constants::REDB_FILE_NAME;
use crate::error::AppError;
use std::path::Path;
use std::sync::Arc;

/// Database handle with access to the underlying redb tables.
pub struct Database {
    pub entries: entries::EntryTable,
}


impl Database {
    /// Open (or create) the database under directory `path` and initialize tables.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or redb cannot open
    /// the file.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = Path::new(path);
        std::fs::create_dir_all(dir).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to create database directory '{}': {}",
                dir.display(),
                err
            ))
        })?;

        let file = dir.join(REDB_FILE_NAME);
        let db = match redb::Database::create(&file) {
            Ok(db) => Arc::new(db),
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database '{}' is already open in another PasteShare process.\n\
                     Stop it first, or set DB_PATH to use a different location.",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!("Opened entry database at {}", file.display());
        Ok(Self {
            entries: entries::EntryTable::new(db)?,
        })
    }
}
