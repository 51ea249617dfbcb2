use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use keepsync_core::config::SyncSettings;
use keepsync_core::gc::DEFAULT_RETENTION;
use keepsync_core::services::{GcReport, Library};
use keepsync_core::sync::HttpTransport;
use keepsync_core::util::is_http_url;
use keepsync_core::{HistoryEntry, LinkStatus, Record, RecordId, SavedLink};
use serde::Serialize;

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const ENV_DATA_DIR: &str = "KEEPSYNC_DATA_DIR";

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    data_dir: Option<PathBuf>,
    profile: Option<String>,
}

impl Context {
    pub const fn new(data_dir: Option<PathBuf>, profile: Option<String>) -> Self {
        Self { data_dir, profile }
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn data_dir(&self) -> Result<PathBuf, CliError> {
        resolve_data_dir(self.data_dir.clone())
    }

    /// Open both collections and run the start-up tombstone collection.
    pub async fn open_library(&self) -> Result<Library<HttpTransport>, CliError> {
        let settings = resolve_sync_settings(self.profile())?;
        open_library_at(&self.data_dir()?, settings).await
    }

    /// Open both collections without collecting tombstones.
    pub fn load_library(&self, retention: Duration) -> Result<Library<HttpTransport>, CliError> {
        let settings = resolve_sync_settings(self.profile())?;
        load_library_at(&self.data_dir()?, settings, retention)
    }
}

pub fn load_library_at(
    data_dir: &Path,
    settings: SyncSettings,
    retention: Duration,
) -> Result<Library<HttpTransport>, CliError> {
    Ok(Library::open_dir(data_dir, settings)?.with_retention(retention))
}

pub async fn open_library_at(
    data_dir: &Path,
    settings: SyncSettings,
) -> Result<Library<HttpTransport>, CliError> {
    let library = load_library_at(data_dir, settings, DEFAULT_RETENTION)?;
    let purged = library.collect_tombstones().await;
    if purged != GcReport::default() {
        tracing::debug!(
            history = purged.history,
            saved_links = purged.saved_links,
            "Purged expired tombstones on start-up"
        );
    }
    Ok(library)
}

pub fn resolve_sync_settings(profile: Option<&str>) -> Result<SyncSettings, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let settings = config
        .profile(&profile_name)
        .map(CliProfile::sync_settings)
        .unwrap_or_default();
    Ok(settings.with_env_overrides())
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_data_dir
        .or_else(|| env::var_os(ENV_DATA_DIR).map(PathBuf::from))
        .or_else(default_data_dir)
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("keepsync"))
}

pub fn normalize_url(url: &str) -> Result<String, CliError> {
    let trimmed = url.trim();
    if is_http_url(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(CliError::InvalidUrl(trimmed.to_string()))
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Resolve a full id or a unique id prefix among visible records.
pub fn resolve_record_id<P>(records: &[Record<P>], query: &str) -> Result<RecordId, CliError> {
    let query = normalize_record_identifier(query)?;
    let visible = records.iter().filter(|record| record.is_visible());

    if let Some(record) = visible.clone().find(|record| record.id.as_str() == query) {
        return Ok(record.id.clone());
    }

    let lowered = query.to_ascii_lowercase();
    let matching = visible
        .filter(|record| record.id.as_str().to_ascii_lowercase().starts_with(&lowered))
        .map(|record| record.id.clone())
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::RecordNotFound(query)),
        [id] => Ok(id.clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &RecordId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated = text
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Flags column: `*` unsynced, `x` deleted.
fn flags<P>(record: &Record<P>) -> String {
    let dirty = if record.is_dirty { '*' } else { ' ' };
    let deleted = if record.is_deleted { 'x' } else { ' ' };
    format!("{dirty}{deleted}")
}

pub fn select_records<P: Clone>(
    records: &[Record<P>],
    include_deleted: bool,
    limit: usize,
    matches: impl Fn(&P) -> bool,
) -> Vec<Record<P>> {
    records
        .iter()
        .filter(|record| include_deleted || record.is_visible())
        .filter(|record| matches(&record.payload))
        .take(limit)
        .cloned()
        .collect()
}

#[derive(Debug, Serialize)]
pub struct HistoryListItem {
    pub id: String,
    pub url: String,
    pub downloader: String,
    pub media_count: u32,
    pub is_success: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
    pub is_deleted: bool,
    pub is_dirty: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkListItem {
    pub id: String,
    pub url: String,
    pub downloader: String,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
    pub is_deleted: bool,
    pub is_dirty: bool,
}

pub fn history_to_list_item(record: &Record<HistoryEntry>, now: DateTime<Utc>) -> HistoryListItem {
    HistoryListItem {
        id: record.id.to_string(),
        url: record.payload.url.clone(),
        downloader: record.payload.downloader.clone(),
        media_count: record.payload.media_count,
        is_success: record.payload.is_success,
        created_at: record.created_at,
        updated_at: record.updated_at,
        relative_time: format_relative_time(record.created_at, now),
        is_deleted: record.is_deleted,
        is_dirty: record.is_dirty,
    }
}

pub fn link_to_list_item(record: &Record<SavedLink>, now: DateTime<Utc>) -> LinkListItem {
    LinkListItem {
        id: record.id.to_string(),
        url: record.payload.url.clone(),
        downloader: record.payload.downloader.clone(),
        status: record.payload.status,
        created_at: record.created_at,
        updated_at: record.updated_at,
        relative_time: format_relative_time(record.created_at, now),
        is_deleted: record.is_deleted,
        is_dirty: record.is_dirty,
    }
}

pub fn format_history_lines(records: &[Record<HistoryEntry>], now: DateTime<Utc>) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let entry = &record.payload;
            let outcome = if entry.is_success { "ok" } else { "failed" };
            format!(
                "{:<13} {} {:<48}  {:<12}  {:>3} {:<6}  {}",
                short_id(&record.id),
                flags(record),
                truncate(&entry.url, 48),
                truncate(&entry.downloader, 12),
                entry.media_count,
                outcome,
                format_relative_time(record.created_at, now)
            )
        })
        .collect()
}

pub fn format_link_lines(records: &[Record<SavedLink>], now: DateTime<Utc>) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let link = &record.payload;
            format!(
                "{:<13} {} {:<48}  {:<12}  {:<7}  {}",
                short_id(&record.id),
                flags(record),
                truncate(&link.url, 48),
                truncate(&link.downloader, 12),
                link.status.as_str(),
                format_relative_time(record.created_at, now)
            )
        })
        .collect()
}
