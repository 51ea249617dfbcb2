//! Shared cross-platform state types.

/// Per-collection sync state published by a coordinator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No round has run yet
    #[default]
    Idle,
    /// Backend URL or token missing
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Syncing)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}
