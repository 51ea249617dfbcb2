//! Services shared across clients.

mod library;

pub use library::{GcReport, Library, SyncAllReport};
