//! Synchronized record skeleton shared by every collection

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Opaque, globally unique record identifier.
///
/// New ids are UUID v7 strings. Ids that arrive from the server are kept
/// verbatim so they round-trip byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("record id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Static description of one synchronized collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    /// Short name used in logs and CLI output
    pub name: &'static str,
    /// Path appended to the backend URL for the sync round trip
    pub sync_path: &'static str,
    /// Durable key holding the record snapshot
    pub records_key: &'static str,
    /// Durable key holding the sync cursor
    pub cursor_key: &'static str,
    /// Maximum number of records kept locally
    pub max_records: usize,
}

/// Collection-specific payload carried by a [`Record`].
///
/// The payload's serde field names are used both in the local snapshot and on
/// the wire, so they must match the server's domain fields.
pub trait Payload:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const COLLECTION: Collection;
}

/// A synchronized record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord<P>")]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
pub struct Record<P> {
    /// Unique identifier
    pub id: RecordId,
    /// Collection-specific fields
    #[serde(flatten)]
    pub payload: P,
    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
    /// Last local or merged-remote change; the only conflict signal
    pub updated_at: DateTime<Utc>,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Local-only: change not yet confirmed pushed
    pub is_dirty: bool,
    /// Opaque server-side annotations, carried through merges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl<P> Record<P> {
    /// Create a fresh, dirty record stamped at `now`
    pub fn new(payload: P, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            payload,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            is_dirty: true,
            metadata: None,
        }
    }

    /// Whether the record is surfaced to the application layer
    pub const fn is_visible(&self) -> bool {
        !self.is_deleted
    }

    /// Refresh `updated_at` without ever moving it backwards.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
        self.is_dirty = true;
    }
}

/// On-disk shape of a record, tolerant of snapshots written by older builds.
#[derive(Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
struct StoredRecord<P> {
    id: RecordId,
    #[serde(flatten)]
    payload: P,
    #[serde(alias = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default = "default_dirty")]
    is_dirty: bool,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

const fn default_dirty() -> bool {
    true
}

impl<P> From<StoredRecord<P>> for Record<P> {
    fn from(stored: StoredRecord<P>) -> Self {
        Self {
            id: stored.id,
            payload: stored.payload,
            created_at: stored.created_at,
            updated_at: stored.updated_at.unwrap_or(stored.created_at),
            is_deleted: stored.is_deleted,
            is_dirty: stored.is_dirty,
            metadata: stored.metadata,
        }
    }
}
