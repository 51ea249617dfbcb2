//! Push/pull sync engine.
//!
//! One round per call: push the dirty batch, receive the server delta, then
//! clear pushed flags, merge and advance the cursor. A round either completes
//! every step or mutates nothing.

mod coordinator;
mod progress;
mod transport;
pub mod wire;

use thiserror::Error;

pub use coordinator::{SyncCoordinator, SyncOutcome, SyncReport};
pub use progress::{ProgressSink, SyncProgress};
pub use transport::{HttpTransport, SyncReply, SyncRequest, SyncTransport};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync is not configured: {0}")]
    Configuration(String),
    #[error("Sync request failed: {0}")]
    Transport(String),
    #[error("Sync server error: {message}")]
    Server { status: u16, message: String },
    #[error("Invalid sync response: {0}")]
    Decode(String),
    #[error("Failed to encode sync request: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport(format!("request timed out: {error}"))
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
