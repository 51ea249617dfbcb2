//! Durable key/value backends for collection snapshots

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

/// Durable storage holding one string value per key.
///
/// Each collection writes its full record snapshot under one key and its sync
/// cursor under another.
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Move an unreadable value out of the way so the next save starts fresh.
    fn quarantine(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a snapshot directory, creating it if it doesn't exist
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !valid || key.starts_with('.') {
            return Err(Error::InvalidInput(format!("invalid snapshot key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        atomic_write(&path, value)
    }

    fn quarantine(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(());
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let backup_path = self.dir.join(format!("{key}.corrupt-{timestamp}"));
        fs::rename(&path, &backup_path)?;
        tracing::warn!(
            "Moved unreadable snapshot from {} to {}",
            path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

/// Write to a sibling temp file, fsync, then rename over the target.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// In-process snapshot storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, e.g. to simulate a snapshot written by another build.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }

    fn quarantine(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(raw) = values.remove(key) {
            values.insert(format!("{key}.corrupt"), raw);
        }
        Ok(())
    }
}
