//! Both collections behind one handle.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::gc::TombstoneCollector;
use crate::models::{HistoryEntry, SavedLink};
use crate::store::{FileSnapshotStore, LocalStore, SharedStore, SnapshotStore};
use crate::sync::{
    HttpTransport, ProgressSink, SyncCoordinator, SyncOutcome, SyncResult, SyncTransport,
};
use crate::Result;

/// Per-collection results of [`Library::sync_all`].
#[derive(Debug)]
pub struct SyncAllReport {
    pub history: SyncResult<SyncOutcome>,
    pub saved_links: SyncResult<SyncOutcome>,
}

impl SyncAllReport {
    pub const fn all_ok(&self) -> bool {
        self.history.is_ok() && self.saved_links.is_ok()
    }
}

/// Tombstones purged per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub history: usize,
    pub saved_links: usize,
}

/// Download history and saved links, each with its own store and coordinator.
///
/// The two collections share a snapshot backend, clock and transport but no
/// lock; their rounds run independently.
pub struct Library<T> {
    history: SyncCoordinator<HistoryEntry, T>,
    saved_links: SyncCoordinator<SavedLink, T>,
    gc: TombstoneCollector,
}

impl Library<HttpTransport> {
    /// Open both collections from JSON snapshots in `dir`.
    pub fn open_dir(dir: impl Into<PathBuf>, settings: SyncSettings) -> Result<Self> {
        let snapshot = FileSnapshotStore::open(dir)?;
        let transport = HttpTransport::new(settings.timeout())?;
        tracing::debug!("Opening library in {}", snapshot.dir().display());
        Ok(Self::open(
            Arc::new(snapshot),
            Arc::new(SystemClock),
            settings,
            transport,
        ))
    }
}

impl<T: SyncTransport + Clone> Library<T> {
    pub fn open(
        snapshot: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
        transport: T,
    ) -> Self {
        let history = LocalStore::open(snapshot.clone(), clock.clone()).into_shared();
        let saved_links = LocalStore::open(snapshot, clock).into_shared();

        Self {
            history: SyncCoordinator::new(history, transport.clone(), settings.clone()),
            saved_links: SyncCoordinator::new(saved_links, transport, settings),
            gc: TombstoneCollector::default(),
        }
    }

    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.gc = TombstoneCollector::new(retention);
        self
    }

    /// Attach the same progress sink to both coordinators.
    #[must_use]
    pub fn with_progress(self, sink: ProgressSink) -> Self {
        Self {
            history: self.history.with_progress(sink.clone()),
            saved_links: self.saved_links.with_progress(sink),
            gc: self.gc,
        }
    }

    pub const fn history(&self) -> &SharedStore<HistoryEntry> {
        self.history.store()
    }

    pub const fn saved_links(&self) -> &SharedStore<SavedLink> {
        self.saved_links.store()
    }

    pub const fn history_sync(&self) -> &SyncCoordinator<HistoryEntry, T> {
        &self.history
    }

    pub const fn saved_links_sync(&self) -> &SyncCoordinator<SavedLink, T> {
        &self.saved_links
    }

    pub const fn collector(&self) -> TombstoneCollector {
        self.gc
    }

    /// Sync both collections concurrently.
    pub async fn sync_all(&self) -> SyncAllReport {
        let (history, saved_links) = tokio::join!(self.history.sync(), self.saved_links.sync());
        SyncAllReport {
            history,
            saved_links,
        }
    }

    /// Run one tombstone collection pass over both collections.
    pub async fn collect_tombstones(&self) -> GcReport {
        let history = self.gc.collect(&mut *self.history().lock().await);
        let saved_links = self.gc.collect(&mut *self.saved_links().lock().await);
        GcReport {
            history,
            saved_links,
        }
    }

    /// Retry pending snapshot writes for both collections.
    pub async fn flush(&self) -> Result<()> {
        let history = self.history().lock().await.flush();
        let saved_links = self.saved_links().lock().await.flush();
        history.and(saved_links)
    }
}
