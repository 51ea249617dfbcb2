//! Local-first record store
//!
//! A [`LocalStore`] owns one collection: an ordered, capped list of records
//! (newest first, tombstones included) plus the collection's sync cursor.
//! Every mutation is applied in memory and then the full snapshot is written
//! to a [`SnapshotStore`]. A failed write is logged and retried on the next
//! mutation or [`LocalStore::flush`]; it never rolls back the in-memory change.

mod snapshot;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::models::{Collection, Payload, Record, RecordId};

pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

/// Store handle shared between the presentation layer and the sync coordinator.
pub type SharedStore<P> = Arc<Mutex<LocalStore<P>>>;

/// Monotonic counter bumped after every observable mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreRevision(pub u64);

/// Position in the store's sequence of local edits.
///
/// Taken together with a push batch; records edited after it stay dirty
/// when the batch is acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct EditMark(u64);

/// Outcome of applying a batch of remote records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Unseen ids that were inserted
    pub inserted: usize,
    /// Local records replaced by a newer-or-equal remote copy
    pub updated: usize,
    /// Remote copies identical to the stored record
    pub unchanged: usize,
    /// Remote copies discarded because the local record is newer
    pub skipped: usize,
}

impl MergeReport {
    pub const fn changed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// In-memory collection with snapshot persistence.
pub struct LocalStore<P: Payload> {
    collection: Collection,
    records: Vec<Record<P>>,
    last_synced_at: Option<DateTime<Utc>>,
    snapshot: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    revision: watch::Sender<StoreRevision>,
    unsaved: bool,
    /// Last local edit per record id; local-only, never persisted
    edits: HashMap<RecordId, u64>,
    edit_seq: u64,
}

impl<P: Payload> LocalStore<P> {
    /// Load the collection from `snapshot`.
    ///
    /// An unreadable snapshot is quarantined and the collection starts empty.
    pub fn open(snapshot: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        let collection = P::COLLECTION;
        let records = load_records::<P>(snapshot.as_ref(), collection);
        let last_synced_at = load_cursor(snapshot.as_ref(), collection);
        let (revision, _) = watch::channel(StoreRevision::default());

        tracing::debug!(
            collection = collection.name,
            records = records.len(),
            "Loaded local store"
        );

        Self {
            collection,
            records,
            last_synced_at,
            snapshot,
            clock,
            revision,
            unsaved: false,
            edits: HashMap::new(),
            edit_seq: 0,
        }
    }

    /// Open an in-memory store on the wall clock (useful for testing)
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemorySnapshotStore::new()), Arc::new(SystemClock))
    }

    /// Wrap the store for sharing with a sync coordinator.
    pub fn into_shared(self) -> SharedStore<P> {
        Arc::new(Mutex::new(self))
    }

    pub const fn collection(&self) -> Collection {
        self.collection
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Add a new record at the front, evicting the oldest beyond the cap.
    pub fn add(&mut self, payload: P) -> Record<P> {
        let record = Record::new(payload, self.clock.now());
        self.records.insert(0, record.clone());
        self.note_edit(&record.id);
        self.evict_over_cap();
        self.commit();
        record
    }

    /// Add several records in order; the last payload ends up first.
    pub fn add_many(&mut self, payloads: impl IntoIterator<Item = P>) -> Vec<Record<P>> {
        let now = self.clock.now();
        let added = payloads
            .into_iter()
            .map(|payload| Record::new(payload, now))
            .collect::<Vec<_>>();
        if added.is_empty() {
            return added;
        }

        for record in &added {
            self.records.insert(0, record.clone());
            self.note_edit(&record.id);
        }
        self.evict_over_cap();
        self.commit();
        added
    }

    /// Mutate the payload of a visible record.
    ///
    /// Returns the updated record, or `None` when the id is absent or deleted.
    pub fn update(&mut self, id: &RecordId, mutate: impl FnOnce(&mut P)) -> Option<Record<P>> {
        let now = self.clock.now();
        let record = self
            .records
            .iter_mut()
            .find(|record| &record.id == id && record.is_visible())?;

        mutate(&mut record.payload);
        record.touch(now);
        let updated = record.clone();
        self.note_edit(&updated.id);
        self.commit();
        Some(updated)
    }

    /// Soft-delete a record. Returns `false` if absent or already deleted.
    pub fn soft_delete(&mut self, id: &RecordId) -> bool {
        let now = self.clock.now();
        let Some(record) = self
            .records
            .iter_mut()
            .find(|record| &record.id == id && record.is_visible())
        else {
            return false;
        };

        record.is_deleted = true;
        record.touch(now);
        let id = record.id.clone();
        self.note_edit(&id);
        self.commit();
        true
    }

    /// Soft-delete every visible record. Returns how many were deleted.
    pub fn clear(&mut self) -> usize {
        let now = self.clock.now();
        let mut deleted = Vec::new();
        for record in self.records.iter_mut().filter(|record| record.is_visible()) {
            record.is_deleted = true;
            record.touch(now);
            deleted.push(record.id.clone());
        }
        for id in &deleted {
            self.note_edit(id);
        }

        let deleted = deleted.len();
        if deleted > 0 {
            self.commit();
        }
        deleted
    }

    /// Remove a record outright, bypassing tombstones.
    pub fn hard_delete(&mut self, id: &RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| &record.id != id);
        self.edits.remove(id);
        let removed = self.records.len() < before;
        if removed {
            self.commit();
        }
        removed
    }

    /// Records surfaced to the application layer, in display order.
    pub fn visible(&self) -> Vec<Record<P>> {
        self.records
            .iter()
            .filter(|record| record.is_visible())
            .cloned()
            .collect()
    }

    /// Records with unpushed changes, tombstones included.
    pub fn fetch_dirty(&self) -> Vec<Record<P>> {
        self.records
            .iter()
            .filter(|record| record.is_dirty)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record<P>> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// Full collection, tombstones included.
    pub fn records(&self) -> &[Record<P>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clear the dirty flag for `ids`; unknown ids are ignored.
    pub fn mark_clean<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) -> usize {
        let ids = ids.into_iter().collect::<HashSet<_>>();
        let mut cleaned = 0;
        for record in &mut self.records {
            if record.is_dirty && ids.contains(&record.id) {
                record.is_dirty = false;
                self.edits.remove(&record.id);
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            self.commit();
        }
        cleaned
    }

    /// Current position in the local edit sequence.
    pub const fn edit_mark(&self) -> EditMark {
        EditMark(self.edit_seq)
    }

    /// Clear the dirty flag for records pushed in a completed round.
    ///
    /// `taken_at` is the [`EditMark`] read together with the batch. A record
    /// edited again after it keeps its flag, whatever its timestamp says.
    pub fn mark_pushed(&mut self, pushed: &[Record<P>], taken_at: EditMark) -> usize {
        let settled = pushed
            .iter()
            .filter(|sent| {
                self.edits
                    .get(&sent.id)
                    .is_none_or(|&edited| edited <= taken_at.0)
            })
            .map(|sent| &sent.id)
            .collect::<Vec<_>>();

        if settled.len() < pushed.len() {
            tracing::debug!(
                collection = self.collection.name,
                edited = pushed.len() - settled.len(),
                "Records edited during sync stay dirty"
            );
        }

        self.mark_clean(settled)
    }

    /// Apply remote records with last-writer-wins on `updated_at`.
    ///
    /// Ties favor the remote copy. Merged records are stored clean.
    pub fn merge_remote(&mut self, incoming: Vec<Record<P>>) -> MergeReport {
        let mut report = MergeReport::default();

        for mut remote in incoming {
            remote.is_dirty = false;

            if let Some(local) = self.records.iter_mut().find(|record| record.id == remote.id) {
                if remote == *local {
                    report.unchanged += 1;
                } else if remote.updated_at >= local.updated_at {
                    tracing::debug!(
                        collection = self.collection.name,
                        id = %remote.id,
                        local_deleted = local.is_deleted,
                        remote_deleted = remote.is_deleted,
                        "Merge [update]"
                    );
                    self.edits.remove(&remote.id);
                    *local = remote;
                    report.updated += 1;
                } else {
                    tracing::debug!(
                        collection = self.collection.name,
                        id = %remote.id,
                        remote_updated_at = %remote.updated_at,
                        local_updated_at = %local.updated_at,
                        "Merge [skip]"
                    );
                    report.skipped += 1;
                }
            } else {
                tracing::debug!(
                    collection = self.collection.name,
                    id = %remote.id,
                    is_deleted = remote.is_deleted,
                    "Merge [new]"
                );
                self.records.push(remote);
                report.inserted += 1;
            }
        }

        if report.changed() > 0 {
            self.records
                .sort_by(|left, right| right.created_at.cmp(&left.created_at));
            self.commit();
        }
        report
    }

    /// Permanently remove tombstones older than `retention`.
    pub fn cleanup_tombstones(&mut self, retention: Duration) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records
            .retain(|record| !(record.is_deleted && now - record.updated_at > retention));
        let purged = before - self.records.len();

        if purged > 0 {
            self.prune_edits();
            tracing::info!(
                collection = self.collection.name,
                purged,
                "Cleaned up stale deleted records"
            );
            self.commit();
        }
        purged
    }

    /// Cursor bounding incremental pulls.
    pub const fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn set_last_synced_at(&mut self, value: DateTime<Utc>) {
        self.last_synced_at = Some(value);
        if let Err(error) = self.save_cursor() {
            tracing::error!(
                collection = self.collection.name,
                "Failed to save sync cursor: {}",
                error
            );
        }
    }

    /// Subscribe to mutation notifications.
    pub fn subscribe(&self) -> watch::Receiver<StoreRevision> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> StoreRevision {
        *self.revision.borrow()
    }

    /// Whether the last snapshot write failed and is still pending.
    pub const fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Write the snapshot if the last attempt failed.
    pub fn flush(&mut self) -> Result<()> {
        if self.unsaved {
            self.save_records()?;
            self.unsaved = false;
        }
        Ok(())
    }

    fn evict_over_cap(&mut self) {
        let cap = self.collection.max_records;
        if self.records.len() > cap {
            let evicted = self.records.len() - cap;
            self.records.truncate(cap);
            self.prune_edits();
            tracing::debug!(
                collection = self.collection.name,
                evicted,
                "Evicted oldest records over cap"
            );
        }
    }

    fn note_edit(&mut self, id: &RecordId) {
        self.edit_seq += 1;
        self.edits.insert(id.clone(), self.edit_seq);
    }

    fn prune_edits(&mut self) {
        let live = self
            .records
            .iter()
            .map(|record| &record.id)
            .collect::<HashSet<_>>();
        self.edits.retain(|id, _| live.contains(id));
    }

    fn commit(&mut self) {
        match self.save_records() {
            Ok(()) => self.unsaved = false,
            Err(error) => {
                self.unsaved = true;
                tracing::error!(
                    collection = self.collection.name,
                    "Failed to save snapshot: {}",
                    error
                );
            }
        }
        self.revision.send_modify(|revision| revision.0 += 1);
    }

    fn save_records(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.records)?;
        self.snapshot.save(self.collection.records_key, &raw)
    }

    fn save_cursor(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.last_synced_at)?;
        self.snapshot.save(self.collection.cursor_key, &raw)
    }
}

fn load_records<P: Payload>(snapshot: &dyn SnapshotStore, collection: Collection) -> Vec<Record<P>> {
    let raw = match snapshot.load(collection.records_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(error) => {
            tracing::error!(
                collection = collection.name,
                "Failed to read snapshot, starting empty: {}",
                error
            );
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Record<P>>>(&raw) {
        Ok(records) => {
            let mut seen = HashSet::new();
            records
                .into_iter()
                .filter(|record| seen.insert(record.id.clone()))
                .collect()
        }
        Err(error) => {
            tracing::warn!(
                collection = collection.name,
                "Unreadable snapshot, starting empty: {}",
                error
            );
            if let Err(error) = snapshot.quarantine(collection.records_key) {
                tracing::error!(
                    collection = collection.name,
                    "Failed to quarantine snapshot: {}",
                    error
                );
            }
            Vec::new()
        }
    }
}

fn load_cursor(snapshot: &dyn SnapshotStore, collection: Collection) -> Option<DateTime<Utc>> {
    let raw = snapshot.load(collection.cursor_key).ok().flatten()?;
    match serde_json::from_str::<Option<DateTime<Utc>>>(&raw) {
        Ok(cursor) => cursor,
        Err(error) => {
            tracing::warn!(
                collection = collection.name,
                "Ignoring unreadable sync cursor: {}",
                error
            );
            None
        }
    }
}
