//! Per-collection sync coordinator.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::progress::{ProgressSink, SyncProgress};
use super::transport::{SyncRequest, SyncTransport};
use super::wire::{decode_response, encode_request, parse_error_body};
use super::{SyncError, SyncResult};
use crate::config::{SyncEndpoint, SyncSettings};
use crate::models::Payload;
use crate::state::SyncState;
use crate::store::{MergeReport, SharedStore};

/// Result of a `sync()` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another round for the same collection was in flight; nothing was done
    AlreadyRunning,
}

impl SyncOutcome {
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Summary of a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Records sent in the push batch
    pub pushed: usize,
    /// Pushed records whose dirty flag was cleared
    pub cleaned: usize,
    /// Records received from the server
    pub pulled: usize,
    pub merge: MergeReport,
    /// New cursor, as reported by the server
    pub synced_at: DateTime<Utc>,
}

/// Runs push/pull rounds for one collection.
///
/// At most one round is in flight at a time; a call made while a round runs
/// returns [`SyncOutcome::AlreadyRunning`] immediately.
pub struct SyncCoordinator<P: Payload, T> {
    store: SharedStore<P>,
    transport: T,
    settings: SyncSettings,
    in_flight: AtomicBool,
    state: watch::Sender<SyncState>,
    progress: Option<ProgressSink>,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<P: Payload, T: SyncTransport> SyncCoordinator<P, T> {
    pub fn new(store: SharedStore<P>, transport: T, settings: SyncSettings) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            store,
            transport,
            settings,
            in_flight: AtomicBool::new(false),
            state,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub const fn store(&self) -> &SharedStore<P> {
        &self.store
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one push/pull round.
    ///
    /// On any error no dirty flag is cleared, nothing is merged and the
    /// cursor stays where it was.
    pub async fn sync(&self) -> SyncResult<SyncOutcome> {
        let collection = P::COLLECTION.name;
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(collection, "Sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let endpoint = match self.settings.endpoint() {
            Ok(endpoint) => endpoint,
            Err(error) => {
                tracing::warn!(collection, "Skipping sync: {}", error);
                self.state.send_replace(SyncState::Offline);
                return Err(error);
            }
        };

        self.state.send_replace(SyncState::Syncing);
        self.emit(SyncProgress::Started { collection });

        match self.run_round(&endpoint).await {
            Ok(report) => {
                tracing::info!(
                    collection,
                    pushed = report.pushed,
                    pulled = report.pulled,
                    inserted = report.merge.inserted,
                    updated = report.merge.updated,
                    unchanged = report.merge.unchanged,
                    skipped = report.merge.skipped,
                    synced_at = %report.synced_at,
                    "Sync completed"
                );
                self.state.send_replace(SyncState::Synced);
                self.emit(SyncProgress::Completed {
                    collection,
                    synced_at: report.synced_at,
                });
                Ok(SyncOutcome::Completed(report))
            }
            Err(error) => {
                tracing::warn!(collection, "Sync failed: {}", error);
                self.state.send_replace(SyncState::Error);
                self.emit(SyncProgress::Failed {
                    collection,
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn run_round(&self, endpoint: &SyncEndpoint) -> SyncResult<SyncReport> {
        let collection = P::COLLECTION;

        let (batch, taken_at, cursor) = {
            let store = self.store.lock().await;
            (store.fetch_dirty(), store.edit_mark(), store.last_synced_at())
        };
        let since = cursor.filter(|_| endpoint.incremental);
        let body = encode_request(&batch)?;

        tracing::debug!(
            collection = collection.name,
            dirty = batch.len(),
            since = ?since,
            "Pushing local changes"
        );
        self.emit(SyncProgress::Pushing {
            collection: collection.name,
            count: batch.len(),
        });

        let reply = self
            .transport
            .send(SyncRequest {
                url: endpoint.url_for(collection.sync_path),
                token: endpoint.token.clone(),
                since,
                body,
            })
            .await?;

        if !reply.is_success() {
            return Err(SyncError::Server {
                status: reply.status,
                message: parse_error_body(reply.status, &reply.body),
            });
        }

        let pull = decode_response::<P>(&reply.body)?;
        let pulled = pull.records.len();
        self.emit(SyncProgress::Received {
            collection: collection.name,
            count: pulled,
        });

        let (cleaned, merge) = {
            let mut store = self.store.lock().await;
            let cleaned = store.mark_pushed(&batch, taken_at);
            let merge = store.merge_remote(pull.records);
            store.set_last_synced_at(pull.synced_at);
            (cleaned, merge)
        };
        self.emit(SyncProgress::Merged {
            collection: collection.name,
            inserted: merge.inserted,
            updated: merge.updated,
            skipped: merge.skipped,
        });

        Ok(SyncReport {
            pushed: batch.len(),
            cleaned,
            pulled,
            merge,
            synced_at: pull.synced_at,
        })
    }

    fn emit(&self, event: SyncProgress) {
        if let Some(sink) = &self.progress {
            sink(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use crate::clock::ManualClock;
    use crate::models::{HistoryEntry, Record};
    use crate::store::{LocalStore, MemorySnapshotStore};
    use crate::sync::SyncReply;

    const EPOCH_REPLY: &str = r#"{"records":[],"syncedAt":"2025-01-01T00:00:00.000Z"}"#;

    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<SyncResult<SyncReply>>>,
        requests: Mutex<Vec<SyncRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<SyncResult<SyncReply>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<SyncRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl SyncTransport for ScriptedTransport {
        async fn send(&self, request: SyncRequest) -> SyncResult<SyncReply> {
            self.requests.lock().unwrap().push(request);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(reply(200, EPOCH_REPLY)))
        }
    }

    fn reply(status: u16, body: &str) -> SyncReply {
        SyncReply {
            status,
            body: body.to_string(),
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn shared_store() -> (SharedStore<HistoryEntry>, ManualClock) {
        let clock = ManualClock::new(start());
        let store = LocalStore::open(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(clock.clone()),
        );
        (store.into_shared(), clock)
    }

    fn settings() -> SyncSettings {
        SyncSettings::new("https://api.example.com/", "secret")
    }

    fn entry(url: &str) -> HistoryEntry {
        HistoryEntry::new(url, "twitter", true, 1)
    }

    #[tokio::test]
    async fn successful_round_cleans_and_advances_cursor() {
        let (store, _) = shared_store();
        let added = store.lock().await.add(entry("https://x/1"));
        let coordinator =
            SyncCoordinator::new(store.clone(), ScriptedTransport::default(), settings());

        let outcome = coordinator.sync().await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.cleaned, 1);
        assert_eq!(report.pulled, 0);

        let store = store.lock().await;
        assert!(!store.get(&added.id).unwrap().is_dirty);
        assert_eq!(
            store.last_synced_at(),
            Some(crate::sync::wire::parse_timestamp("2025-01-01T00:00:00Z").unwrap())
        );
        assert_eq!(coordinator.state(), SyncState::Synced);

        let requests = coordinator.transport.requests();
        assert_eq!(requests[0].url, "https://api.example.com/v1/history/sync");
        assert_eq!(requests[0].since, None);
        assert!(requests[0].body.contains("https://x/1"));
    }

    #[tokio::test]
    async fn incremental_round_sends_cursor() {
        let (store, _) = shared_store();
        store.lock().await.set_last_synced_at(start());

        let coordinator = SyncCoordinator::new(
            store.clone(),
            ScriptedTransport::default(),
            settings().with_incremental_sync(true),
        );
        coordinator.sync().await.unwrap();
        assert_eq!(coordinator.transport.requests()[0].since, Some(start()));

        let full = SyncCoordinator::new(store, ScriptedTransport::default(), settings());
        full.sync().await.unwrap();
        assert_eq!(full.transport.requests()[0].since, None);
    }

    #[tokio::test]
    async fn missing_configuration_skips_round() {
        let (store, _) = shared_store();
        store.lock().await.add(entry("https://x/1"));
        let coordinator = SyncCoordinator::new(
            store.clone(),
            ScriptedTransport::default(),
            SyncSettings::default(),
        );

        let error = coordinator.sync().await.unwrap_err();
        assert!(matches!(error, SyncError::Configuration(_)));
        assert_eq!(coordinator.state(), SyncState::Offline);
        assert!(coordinator.transport.requests().is_empty());
        assert_eq!(store.lock().await.fetch_dirty().len(), 1);
        assert!(!coordinator.is_syncing());
    }

    #[tokio::test]
    async fn server_error_leaves_state_untouched() {
        let (store, _) = shared_store();
        store.lock().await.add(entry("https://x/1"));
        let transport = ScriptedTransport::replying(vec![Ok(reply(
            401,
            r#"{"error":"invalid token"}"#,
        ))]);
        let coordinator = SyncCoordinator::new(store.clone(), transport, settings());

        let error = coordinator.sync().await.unwrap_err();
        match error {
            SyncError::Server { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid token (401)");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let store = store.lock().await;
        assert_eq!(store.fetch_dirty().len(), 1);
        assert_eq!(store.last_synced_at(), None);
        assert_eq!(coordinator.state(), SyncState::Error);
    }

    #[tokio::test]
    async fn transport_error_leaves_state_untouched() {
        let (store, _) = shared_store();
        store.lock().await.add(entry("https://x/1"));
        let transport = ScriptedTransport::replying(vec![Err(SyncError::Transport(
            "connection refused".to_string(),
        ))]);
        let coordinator = SyncCoordinator::new(store.clone(), transport, settings());

        assert!(matches!(
            coordinator.sync().await,
            Err(SyncError::Transport(_))
        ));
        assert_eq!(store.lock().await.fetch_dirty().len(), 1);
    }

    #[tokio::test]
    async fn decode_error_aborts_before_mutation() {
        let (store, _) = shared_store();
        store.lock().await.add(entry("https://x/1"));
        let body = r#"{
            "records": [
                {"id":"ok","url":"https://x/ok","downloader":"a","created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"},
                {"id":"bad","url":"https://x/bad","downloader":"a","created_at":"soon","updated_at":"2025-01-01T00:00:00Z"}
            ],
            "syncedAt": "2025-01-01T00:00:00Z"
        }"#;
        let transport = ScriptedTransport::replying(vec![Ok(reply(200, body))]);
        let coordinator = SyncCoordinator::new(store.clone(), transport, settings());
        let revision = store.lock().await.revision();

        assert!(matches!(coordinator.sync().await, Err(SyncError::Decode(_))));

        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.fetch_dirty().len(), 1);
        assert_eq!(store.last_synced_at(), None);
        assert_eq!(store.revision(), revision);
    }

    #[tokio::test]
    async fn edits_during_round_stay_dirty() {
        let (store, clock) = shared_store();
        let added = store.lock().await.add(entry("https://x/1"));
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport {
            gate: Some(gate.clone()),
            ..ScriptedTransport::default()
        };
        let coordinator = Arc::new(SyncCoordinator::new(store.clone(), transport, settings()));

        let round = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.sync().await }
        });
        while coordinator.transport.requests().is_empty() {
            tokio::task::yield_now().await;
        }

        clock.advance(chrono::Duration::seconds(1));
        store
            .lock()
            .await
            .update(&added.id, |entry| entry.media_count = 9);
        gate.notify_one();

        let report = round.await.unwrap().unwrap();
        assert_eq!(report.report().unwrap().cleaned, 0);
        assert!(store.lock().await.get(&added.id).unwrap().is_dirty);
    }

    #[tokio::test]
    async fn overlapping_call_is_a_no_op() {
        let (store, _) = shared_store();
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport {
            gate: Some(gate.clone()),
            ..ScriptedTransport::default()
        };
        let coordinator = Arc::new(SyncCoordinator::new(store, transport, settings()));

        let round = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.sync().await }
        });
        while !coordinator.is_syncing() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            coordinator.sync().await.unwrap(),
            SyncOutcome::AlreadyRunning
        );
        gate.notify_one();
        assert!(matches!(
            round.await.unwrap(),
            Ok(SyncOutcome::Completed(_))
        ));
        assert_eq!(coordinator.transport.requests().len(), 1);
        assert!(!coordinator.is_syncing());
    }

    #[tokio::test]
    async fn progress_events_follow_round_order() {
        let (store, _) = shared_store();
        let remote = Record::new(entry("https://x/remote"), start());
        let body = format!(
            r#"{{"records":[{}],"syncedAt":"2025-06-01T00:00:05Z"}}"#,
            serde_json::to_string(&crate::sync::wire::RecordWire::from_record(&remote)).unwrap()
        );
        let transport = ScriptedTransport::replying(vec![Ok(reply(200, &body))]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let events = events.clone();
            Arc::new(move |event: &SyncProgress| events.lock().unwrap().push(event.clone()))
        };
        let coordinator =
            SyncCoordinator::new(store.clone(), transport, settings()).with_progress(sink);

        coordinator.sync().await.unwrap();

        let events = events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                SyncProgress::Started {
                    collection: "history"
                },
                SyncProgress::Pushing {
                    collection: "history",
                    count: 0
                },
                SyncProgress::Received {
                    collection: "history",
                    count: 1
                },
                SyncProgress::Merged {
                    collection: "history",
                    inserted: 1,
                    updated: 0,
                    skipped: 0
                },
                SyncProgress::Completed {
                    collection: "history",
                    synced_at: start() + chrono::Duration::seconds(5)
                },
            ]
        );
        assert_eq!(store.lock().await.visible().len(), 1);
    }

    #[tokio::test]
    async fn state_subscribers_observe_transitions() {
        let (store, _) = shared_store();
        let coordinator = SyncCoordinator::new(store, ScriptedTransport::default(), settings());
        let mut receiver = coordinator.subscribe_state();
        assert_eq!(*receiver.borrow_and_update(), SyncState::Idle);

        coordinator.sync().await.unwrap();

        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow(), SyncState::Synced);
    }
}
