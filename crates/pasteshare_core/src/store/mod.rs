//! Entry persistence: collision-retrying insert and once-aware retrieval.
//!
//! [`EntryStore`] owns the lifecycle rules and talks to the backing store
//! only through [`KeyedStore`]. The redb implementation lives in
//! [`crate::db::entries::EntryTable`].

use crate::access;
use crate::error::AppError;
use crate::keygen::{KeyGenerator, RandomKeyGenerator};
use crate::models::paste::PasteEntry;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a unique insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key already exists; nothing was written.
    DuplicateKey,
}

/// Keyed persistence primitives the entry lifecycle depends on.
///
/// Implementations must make [`KeyedStore::take`] atomic: when several
/// callers race on the same key, at most one receives `Some`.
pub trait KeyedStore: Send + Sync {
    /// Insert `entry` under `entry.key` unless the key is already taken.
    fn insert_unique(&self, entry: &PasteEntry) -> Result<InsertOutcome, AppError>;

    /// Plain read by key.
    fn get(&self, key: &str) -> Result<Option<PasteEntry>, AppError>;

    /// Atomic find-and-remove.
    fn take(&self, key: &str) -> Result<Option<PasteEntry>, AppError>;

    /// Unconditional removal; `true` when a row existed.
    fn remove(&self, key: &str) -> Result<bool, AppError>;

    /// Visit every entry that is not expired at `now`.
    fn scan_live(
        &self,
        now: DateTime<Utc>,
        on_entry: &mut dyn FnMut(&PasteEntry),
    ) -> Result<(), AppError>;

    /// Physically remove entries whose deadline is at or before `now`.
    ///
    /// # Returns
    /// The removed rows, so callers can release their blobs.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<PasteEntry>, AppError>;
}

/// Entry lifecycle over a [`KeyedStore`].
#[derive(Clone)]
pub struct EntryStore {
    backend: Arc<dyn KeyedStore>,
    keys: Arc<dyn KeyGenerator>,
}

impl EntryStore {
    /// Build a store that draws keys from [`RandomKeyGenerator`].
    pub fn new(backend: Arc<dyn KeyedStore>) -> Self {
        Self::with_key_generator(backend, Arc::new(RandomKeyGenerator))
    }

    /// Build a store with an explicit key source.
    pub fn with_key_generator(backend: Arc<dyn KeyedStore>, keys: Arc<dyn KeyGenerator>) -> Self {
        Self { backend, keys }
    }

    /// Persist `entry` under a freshly generated key.
    ///
    /// Duplicate keys are retried with a new candidate until the backend
    /// accepts one; `created_at` is stamped on the accepted attempt.
    ///
    /// # Returns
    /// The key the entry was stored under.
    ///
    /// # Errors
    /// Propagates backend failures other than key conflicts.
    pub fn insert(&self, mut entry: PasteEntry) -> Result<String, AppError> {
        entry.created_at = Utc::now();
        let mut attempts = 0u32;
        loop {
            entry.key = self.keys.generate();
            attempts += 1;
            match self.backend.insert_unique(&entry)? {
                InsertOutcome::Inserted => {
                    if attempts > 1 {
                        tracing::debug!(
                            "Entry key accepted after {} collision retries",
                            attempts - 1
                        );
                    }
                    return Ok(entry.key);
                }
                InsertOutcome::DuplicateKey => {
                    tracing::debug!("Generated key collided; retrying");
                }
            }
        }
    }

    /// Fetch an entry, consuming it when it is flagged `once`, then apply the
    /// access gate.
    ///
    /// A once entry is removed before the password/expiry check runs, so a
    /// failed check still consumes it.
    ///
    /// # Errors
    /// - [`AppError::NotFound`] when the key is unknown or already consumed.
    /// - [`AppError::WrongPassword`] / [`AppError::ContentExpired`] from the gate.
    /// - Storage errors from the backend.
    pub fn fetch_or_delete(
        &self,
        key: &str,
        password: Option<&str>,
    ) -> Result<PasteEntry, AppError> {
        let entry = self.load(key)?;
        access::evaluate(&entry, password, Utc::now())?;
        Ok(entry)
    }

    /// Read or take the row depending on its `once` flag, without applying
    /// the access gate.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the key is unknown or a racing reader took
    /// the once entry first.
    pub fn load(&self, key: &str) -> Result<PasteEntry, AppError> {
        let peeked = self.backend.get(key)?.ok_or(AppError::NotFound)?;
        if !peeked.once {
            return Ok(peeked);
        }
        self.backend.take(key)?.ok_or(AppError::NotFound)
    }

    /// Unconditionally remove `key`.
    ///
    /// Missing keys are not an error.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn delete(&self, key: &str) -> Result<(), AppError> {
        if !self.backend.remove(key)? {
            tracing::debug!("Delete of unknown entry key {}", key);
        }
        Ok(())
    }

    /// Blob references held by entries that are still readable at `now`.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn live_blob_refs(&self, now: DateTime<Utc>) -> Result<HashSet<String>, AppError> {
        let mut refs = HashSet::new();
        self.backend.scan_live(now, &mut |entry| {
            refs.extend(entry.blob_refs().map(str::to_string));
        })?;
        Ok(refs)
    }

    /// Physically remove expired rows.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<PasteEntry>, AppError> {
        self.backend.purge_expired(now)
    }
}
