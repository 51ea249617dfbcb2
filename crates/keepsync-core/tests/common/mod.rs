//! In-memory sync server shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use keepsync_core::clock::ManualClock;
use keepsync_core::config::SyncSettings;
use keepsync_core::store::{LocalStore, MemorySnapshotStore, SharedStore};
use keepsync_core::sync::wire::{format_timestamp, parse_timestamp};
use keepsync_core::sync::{SyncError, SyncReply, SyncRequest, SyncResult, SyncTransport};
use keepsync_core::Payload;
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";
pub const BASE_URL: &str = "https://sync.test";

pub fn start() -> DateTime<Utc> {
    parse_timestamp("2025-01-01T00:00:00Z").unwrap()
}

pub fn settings() -> SyncSettings {
    SyncSettings::new(BASE_URL, TOKEN).with_incremental_sync(true)
}

pub fn full_settings() -> SyncSettings {
    SyncSettings::new(BASE_URL, TOKEN)
}

pub fn store<P: Payload>(clock: &ManualClock) -> SharedStore<P> {
    LocalStore::open(Arc::new(MemorySnapshotStore::new()), Arc::new(clock.clone())).into_shared()
}

struct StoredRow {
    record: Value,
    updated_at: DateTime<Utc>,
    changed_at: DateTime<Utc>,
}

#[derive(Default)]
struct RemoteState {
    /// Rows per sync path, keyed by record id
    rows: BTreeMap<String, BTreeMap<String, StoredRow>>,
    now: Option<DateTime<Utc>>,
    scripted: VecDeque<SyncResult<SyncReply>>,
    requests: Vec<SyncRequest>,
}

/// Last-writer-wins server keeping records per endpoint path.
///
/// Every request advances the server clock by one second; pulls return rows
/// changed strictly after `since`.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `reply` for the next request instead of processing it.
    pub fn script(&self, reply: SyncResult<SyncReply>) {
        self.state.lock().unwrap().scripted.push_back(reply);
    }

    pub fn requests(&self) -> Vec<SyncRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn record(&self, path: &str, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .rows
            .get(path)
            .and_then(|rows| rows.get(id))
            .map(|row| row.record.clone())
    }

    pub fn len(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .rows
            .get(path)
            .map_or(0, BTreeMap::len)
    }

    fn handle(state: &mut RemoteState, request: &SyncRequest) -> SyncReply {
        if request.token != TOKEN {
            return reply(401, &json!({"error": "invalid token"}).to_string());
        }
        let Some(path) = request.url.strip_prefix(BASE_URL) else {
            return reply(404, "");
        };

        let now = state.now.map_or_else(start, |now| now + Duration::seconds(1));
        state.now = Some(now);

        let Ok(body) = serde_json::from_str::<Value>(&request.body) else {
            return reply(400, &json!({"error": "invalid body"}).to_string());
        };
        let rows = state.rows.entry(path.to_string()).or_default();

        for record in body["records"].as_array().into_iter().flatten() {
            let id = record["id"].as_str().unwrap_or_default().to_string();
            let updated_at = record["updated_at"]
                .as_str()
                .and_then(|raw| parse_timestamp(raw).ok())
                .unwrap_or(now);
            let newer = rows
                .get(&id)
                .map_or(true, |existing| updated_at >= existing.updated_at);
            if newer {
                rows.insert(
                    id,
                    StoredRow {
                        record: record.clone(),
                        updated_at,
                        changed_at: now,
                    },
                );
            }
        }

        let records = rows
            .values()
            .filter(|row| request.since.map_or(true, |since| row.changed_at > since))
            .map(|row| row.record.clone())
            .collect::<Vec<_>>();

        reply(
            200,
            &json!({"records": records, "syncedAt": format_timestamp(now)}).to_string(),
        )
    }
}

impl SyncTransport for InMemoryRemote {
    async fn send(&self, request: SyncRequest) -> SyncResult<SyncReply> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if let Some(scripted) = state.scripted.pop_front() {
            return scripted;
        }
        Ok(Self::handle(&mut state, &request))
    }
}

pub fn reply(status: u16, body: &str) -> SyncReply {
    SyncReply {
        status,
        body: body.to_string(),
    }
}

pub fn transport_down() -> SyncResult<SyncReply> {
    Err(SyncError::Transport("connection refused".to_string()))
}
