//! Sync backend configuration.
//!
//! Clients keep a backend URL and a shared token. Both must be present for a
//! sync round to run; otherwise the round is skipped with a configuration
//! error and nothing is retried by the engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::SyncError;
use crate::util::{is_http_url, normalize_text_option, parse_flag};

/// Default transport timeout for one sync round trip
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_BACKEND_URL: &str = "KEEPSYNC_BACKEND_URL";
pub const ENV_BACKEND_TOKEN: &str = "KEEPSYNC_BACKEND_TOKEN";
pub const ENV_INCREMENTAL_SYNC: &str = "KEEPSYNC_INCREMENTAL_SYNC";

/// User-provided sync settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub backend_token: Option<String>,
    /// Send the stored cursor so the server returns only newer changes
    #[serde(default = "default_incremental")]
    pub incremental_sync: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_incremental() -> bool {
    false
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_token: None,
            incremental_sync: default_incremental(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("backend_url", &self.backend_url)
            .field(
                "backend_token",
                &self.backend_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("incremental_sync", &self.incremental_sync)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Resolved backend location, ready for a round trip.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncEndpoint {
    pub base_url: String,
    pub token: String,
    pub incremental: bool,
}

impl fmt::Debug for SyncEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncEndpoint")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("incremental", &self.incremental)
            .finish()
    }
}

impl SyncEndpoint {
    /// Full URL for a collection's sync path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl SyncSettings {
    pub fn new(backend_url: impl Into<String>, backend_token: impl Into<String>) -> Self {
        Self {
            backend_url: Some(backend_url.into()),
            backend_token: Some(backend_token.into()),
            ..Self::default()
        }
    }

    /// Send the stored cursor so rounds pull only newer changes.
    ///
    /// Off by default: every round fetches the full set.
    #[must_use]
    pub const fn with_incremental_sync(mut self, enabled: bool) -> Self {
        self.incremental_sync = enabled;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Overlay values from `KEEPSYNC_*` environment variables.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = normalize_text_option(std::env::var(ENV_BACKEND_URL).ok()) {
            self.backend_url = Some(url);
        }
        if let Some(token) = normalize_text_option(std::env::var(ENV_BACKEND_TOKEN).ok()) {
            self.backend_token = Some(token);
        }
        if let Some(flag) = std::env::var(ENV_INCREMENTAL_SYNC)
            .ok()
            .as_deref()
            .and_then(parse_flag)
        {
            self.incremental_sync = flag;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint().is_ok()
    }

    /// Validate and resolve the backend endpoint.
    pub fn endpoint(&self) -> Result<SyncEndpoint, SyncError> {
        let base_url = normalize_text_option(self.backend_url.clone()).ok_or_else(|| {
            SyncError::Configuration("backend URL is missing".to_string())
        })?;
        if !is_http_url(&base_url) {
            return Err(SyncError::Configuration(
                "backend URL must include http:// or https://".to_string(),
            ));
        }
        let token = normalize_text_option(self.backend_token.clone()).ok_or_else(|| {
            SyncError::Configuration("backend token is missing".to_string())
        })?;

        Ok(SyncEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            incremental: self.incremental_sync,
        })
    }
}
