//! Download history entry

use serde::{Deserialize, Serialize};

use super::record::{Collection, Payload};

/// One finished (or failed) download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The original URL that was downloaded
    pub url: String,
    /// Downloader used for the URL
    pub downloader: String,
    /// Number of media items saved
    #[serde(default = "default_media_count")]
    pub media_count: u32,
    /// Whether the download succeeded
    #[serde(default)]
    pub is_success: bool,
}

const fn default_media_count() -> u32 {
    1
}

impl HistoryEntry {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        downloader: impl Into<String>,
        is_success: bool,
        media_count: u32,
    ) -> Self {
        Self {
            url: url.into(),
            downloader: downloader.into(),
            media_count,
            is_success,
        }
    }
}

impl Payload for HistoryEntry {
    const COLLECTION: Collection = Collection {
        name: "history",
        sync_path: "/v1/history/sync",
        records_key: "downloadHistory",
        cursor_key: "historyLastSyncedAt",
        max_records: 500,
    };
}
