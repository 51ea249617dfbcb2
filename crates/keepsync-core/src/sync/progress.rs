use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Events emitted while a round runs, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    Started { collection: &'static str },
    Pushing { collection: &'static str, count: usize },
    Received { collection: &'static str, count: usize },
    Merged {
        collection: &'static str,
        inserted: usize,
        updated: usize,
        skipped: usize,
    },
    Completed {
        collection: &'static str,
        synced_at: DateTime<Utc>,
    },
    Failed {
        collection: &'static str,
        message: String,
    },
}

impl SyncProgress {
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Started { collection }
            | Self::Pushing { collection, .. }
            | Self::Received { collection, .. }
            | Self::Merged { collection, .. }
            | Self::Completed { collection, .. }
            | Self::Failed { collection, .. } => collection,
        }
    }
}

/// Callback receiving progress events. Must not block.
pub type ProgressSink = Arc<dyn Fn(&SyncProgress) + Send + Sync>;
