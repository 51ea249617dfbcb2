//! Saved link model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::{Collection, Payload};
use crate::error::Error;

/// Downloader recorded for links saved before the field existed
pub const DEFAULT_DOWNLOADER: &str = "unspecified";

/// Outcome of the last download attempt for a saved link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LinkStatus {
    #[default]
    None,
    Success,
    Failure,
}

impl LinkStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(Error::InvalidInput(format!("unknown link status '{other}'"))),
        }
    }
}

// Unknown statuses from newer servers decode as `None`.
impl From<String> for LinkStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// A link saved for a later download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLink {
    pub url: String,
    #[serde(default = "default_downloader")]
    pub downloader: String,
    #[serde(default)]
    pub status: LinkStatus,
}

fn default_downloader() -> String {
    DEFAULT_DOWNLOADER.to_string()
}

impl SavedLink {
    #[must_use]
    pub fn new(url: impl Into<String>, downloader: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            downloader: downloader.into(),
            status: LinkStatus::None,
        }
    }
}

impl Payload for SavedLink {
    const COLLECTION: Collection = Collection {
        name: "saved_links",
        sync_path: "/v1/saved-links/sync",
        records_key: "savedLinks",
        cursor_key: "savedLinksLastSyncedAt",
        max_records: 500,
    };
}
