pub mod common;
pub mod completions;
pub mod config;
pub mod gc;
pub mod history;
pub mod links;
pub mod sync;
