//! keepsync-core - Core library for keepsync
//!
//! This crate contains the record model, the local-first store, tombstone
//! garbage collection, and the push/pull sync engine shared by every keepsync
//! client. Two collections (download history and saved links) run through the
//! same generic engine and never share state.

pub mod clock;
pub mod config;
pub mod error;
pub mod gc;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{HistoryEntry, LinkStatus, Payload, Record, RecordId, SavedLink};
pub use store::{LocalStore, SharedStore};
