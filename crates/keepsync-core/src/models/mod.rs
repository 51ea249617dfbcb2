//! Data models for keepsync

mod history;
mod record;
mod saved_link;

pub use history::HistoryEntry;
pub use record::{Collection, Payload, Record, RecordId};
pub use saved_link::{LinkStatus, SavedLink, DEFAULT_DOWNLOADER};
