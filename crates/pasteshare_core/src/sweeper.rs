//! Background reconciliation of the blob store against live entries.
//!
//! Each sweep purges expired rows (and their blobs), then deletes every blob
//! that no live entry references, along with partial uploads left by
//! cancelled requests. Blobs younger than the grace window are
//! left alone: they may belong to a create that has uploaded but not yet
//! inserted its entry.

use crate::blob::BlobStore;
use crate::error::AppError;
use crate::ingest::rollback;
use crate::store::EntryStore;
use crate::task::run_blocking;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

/// Result of one [`OrphanSweeper::sweep_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was already running.
    Skipped,
    Completed {
        purged_entries: usize,
        deleted_blobs: usize,
    },
}

/// Single-flight orphan blob sweeper.
#[derive(Clone)]
pub struct OrphanSweeper {
    store: EntryStore,
    blobs: Arc<dyn BlobStore>,
    grace: Duration,
    running: Arc<Mutex<()>>,
}

impl OrphanSweeper {
    pub fn new(store: EntryStore, blobs: Arc<dyn BlobStore>, grace: Duration) -> Self {
        Self {
            store,
            blobs,
            grace,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run one sweep now, unless one is already in progress.
    ///
    /// # Errors
    /// Returns storage or blob-store errors; a failed delete of an individual
    /// blob is logged and does not fail the sweep.
    pub async fn sweep_once(&self) -> Result<SweepOutcome, AppError> {
        let Ok(_running) = self.running.try_lock() else {
            debug!("Orphan sweep already running; skipping tick");
            return Ok(SweepOutcome::Skipped);
        };

        let now = Utc::now();
        let store = self.store.clone();
        let purged = run_blocking(move || store.purge_expired(now)).await?;
        let purged_entries = purged.len();
        let expired_refs: Vec<String> = purged
            .iter()
            .flat_map(|entry| entry.blob_refs().map(str::to_string))
            .collect();
        let mut deleted_blobs = expired_refs.len();
        rollback(self.blobs.as_ref(), expired_refs).await;

        // Listing before scanning means an entry inserted in between is
        // still seen as live.
        let listed = self.blobs.list().await?;
        let store = self.store.clone();
        let live = run_blocking(move || store.live_blob_refs(now)).await?;

        match self.blobs.purge_stale_uploads(self.grace).await {
            Ok(removed) => deleted_blobs += removed,
            Err(err) => error!("Failed to purge partial uploads: {}", err),
        }

        let wall_now = SystemTime::now();
        for blob in listed {
            if live.contains(&blob.key) {
                continue;
            }
            let age = wall_now
                .duration_since(blob.last_modified)
                .unwrap_or(Duration::ZERO);
            if age < self.grace {
                debug!("Skipping young unreferenced blob {}", blob.key);
                continue;
            }
            match self.blobs.delete(&blob.key).await {
                Ok(()) => deleted_blobs += 1,
                Err(err) => error!("Failed to delete orphan blob {}: {}", blob.key, err),
            }
        }

        if purged_entries > 0 || deleted_blobs > 0 {
            info!(
                purged_entries,
                deleted_blobs, "Orphan sweep reclaimed storage"
            );
        } else {
            debug!("Orphan sweep found nothing to reclaim");
        }
        Ok(SweepOutcome::Completed {
            purged_entries,
            deleted_blobs,
        })
    }

    /// Sweep every `interval` on a background task.
    ///
    /// The task stops when the returned handle is dropped.
    pub fn start(&self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweep_loop(self.clone(), interval, shutdown_rx));
        info!(
            interval_secs = interval.as_secs(),
            grace_secs = self.grace.as_secs(),
            "Orphan sweeper started"
        );
        SweeperHandle { shutdown_tx }
    }
}

/// Stops the background sweeper when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    pub fn stop(&self) {
        if !*self.shutdown_tx.borrow() {
            let _ = self.shutdown_tx.send(true);
            info!("Orphan sweeper stopped");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep_loop(
    sweeper: OrphanSweeper,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it so startup is not a sweep.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Orphan sweeper received shutdown signal");
                    return;
                }
                continue;
            }
        }

        // Detached so a long sweep does not delay the next tick; an
        // overlapping tick then reports `Skipped`.
        let sweeper = sweeper.clone();
        tokio::spawn(async move {
            if let Err(err) = sweeper.sweep_once().await {
                error!("Orphan sweep failed: {}", err);
            }
        });
    }
}
