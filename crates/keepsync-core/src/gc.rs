//! Tombstone garbage collection
//!
//! Soft-deleted records are kept long enough to carry their deletion to other
//! devices, then purged locally. The server keeps its own retention.

use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::task::JoinHandle;

use crate::models::Payload;
use crate::store::{LocalStore, SharedStore};

/// Default tombstone retention window
pub const DEFAULT_RETENTION: Duration = Duration::days(30);

/// Purges tombstones older than a fixed retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TombstoneCollector {
    retention: Duration,
}

impl Default for TombstoneCollector {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl TombstoneCollector {
    pub const fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub const fn retention(&self) -> Duration {
        self.retention
    }

    /// Run one collection pass over `store`. Returns the purged count.
    pub fn collect<P: Payload>(&self, store: &mut LocalStore<P>) -> usize {
        store.cleanup_tombstones(self.retention)
    }

    /// Run a collection pass every `period`, starting immediately.
    pub fn spawn_periodic<P: Payload>(
        self,
        store: SharedStore<P>,
        period: StdDuration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let mut store = store.lock().await;
                let purged = self.collect(&mut store);
                tracing::debug!(
                    collection = P::COLLECTION.name,
                    purged,
                    "Periodic tombstone collection"
                );
            }
        })
    }
}
