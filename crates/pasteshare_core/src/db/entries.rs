//! Entry storage operations backed by redb.

use super::tables::{ENTRIES, ENTRIES_BY_EXPIRY};
use super::time_util::expiry_index_key;
use crate::error::AppError;
use crate::models::paste::PasteEntry;
use crate::store::{InsertOutcome, KeyedStore};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use std::sync::Arc;

fn deserialize_entry(bytes: &[u8]) -> Result<PasteEntry, AppError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Accessor for entry-related redb tables.
#[derive(Clone)]
pub struct EntryTable {
    db: Arc<redb::Database>,
}

impl EntryTable {
    /// Initialize entry tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(ENTRIES)?;
        write_txn.open_table(ENTRIES_BY_EXPIRY)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Number of stored rows, including expired ones not yet purged.
    ///
    /// # Errors
    /// Returns an error when storage access fails.
    pub fn len(&self) -> Result<u64, AppError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        Ok(entries.len()?)
    }

    /// Whether the table holds no rows.
    ///
    /// # Errors
    /// Returns an error when storage access fails.
    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len()? == 0)
    }

    fn remove_in_txn(
        write_txn: &redb::WriteTransaction,
        key: &str,
    ) -> Result<Option<PasteEntry>, AppError> {
        let mut entries = write_txn.open_table(ENTRIES)?;
        let mut by_expiry = write_txn.open_table(ENTRIES_BY_EXPIRY)?;

        let Some(guard) = entries.remove(key)? else {
            return Ok(None);
        };
        let entry = deserialize_entry(guard.value())?;
        drop(guard);

        if let Some(deadline) = entry.expire_at {
            let _ = by_expiry.remove((expiry_index_key(deadline), key))?;
        }
        Ok(Some(entry))
    }
}

impl KeyedStore for EntryTable {
    fn insert_unique(&self, entry: &PasteEntry) -> Result<InsertOutcome, AppError> {
        let encoded = bincode::serialize(entry)?;
        let key = entry.key.as_str();

        let write_txn = self.db.begin_write()?;
        {
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut by_expiry = write_txn.open_table(ENTRIES_BY_EXPIRY)?;

            if entries.get(key)?.is_some() {
                return Ok(InsertOutcome::DuplicateKey);
            }

            entries.insert(key, encoded.as_slice())?;
            if let Some(deadline) = entry.expire_at {
                by_expiry.insert((expiry_index_key(deadline), key), ())?;
            }
        }
        write_txn.commit()?;
        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, key: &str) -> Result<Option<PasteEntry>, AppError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        match entries.get(key)? {
            Some(value) => Ok(Some(deserialize_entry(value.value())?)),
            None => Ok(None),
        }
    }

    fn take(&self, key: &str) -> Result<Option<PasteEntry>, AppError> {
        // redb serializes write transactions, so only one caller can observe
        // the row before it is removed.
        let write_txn = self.db.begin_write()?;
        let taken = Self::remove_in_txn(&write_txn, key)?;
        if taken.is_some() {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(taken)
    }

    fn remove(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.take(key)?.is_some())
    }

    fn scan_live(
        &self,
        now: DateTime<Utc>,
        on_entry: &mut dyn FnMut(&PasteEntry),
    ) -> Result<(), AppError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        for item in entries.iter()? {
            let (_, value) = item?;
            let entry = deserialize_entry(value.value())?;
            if !entry.is_expired_at(now) {
                on_entry(&entry);
            }
        }
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<PasteEntry>, AppError> {
        let cutoff = expiry_index_key(now);
        let write_txn = self.db.begin_write()?;
        let mut purged = Vec::new();
        {
            let due: Vec<String> = {
                let by_expiry = write_txn.open_table(ENTRIES_BY_EXPIRY)?;
                let mut due = Vec::new();
                for item in by_expiry.iter()? {
                    let (index_key, _) = item?;
                    let (deadline, key) = index_key.value();
                    if deadline > cutoff {
                        break;
                    }
                    due.push(key.to_string());
                }
                due
            };

            for key in due {
                if let Some(entry) = Self::remove_in_txn(&write_txn, &key)? {
                    purged.push(entry);
                }
            }
        }
        write_txn.commit()?;
        Ok(purged)
    }
}
