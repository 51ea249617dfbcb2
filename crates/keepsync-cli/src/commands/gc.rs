use chrono::Duration;
use keepsync_core::services::Library;
use keepsync_core::sync::SyncTransport;

use crate::commands::common::Context;
use crate::error::CliError;

/// Skips the start-up pass; only the requested window applies.
pub async fn run_gc(retention_days: u32, context: &Context) -> Result<(), CliError> {
    let library = context.load_library(Duration::days(i64::from(retention_days)))?;
    let output = execute_gc(retention_days, &library).await?;

    for line in output {
        println!("{line}");
    }
    Ok(())
}

pub async fn execute_gc<T: SyncTransport + Clone>(
    retention_days: u32,
    library: &Library<T>,
) -> Result<Vec<String>, CliError> {
    let report = library.collect_tombstones().await;
    library.flush().await?;

    Ok(vec![format!(
        "Purged {} history entries and {} saved links deleted more than {retention_days} days ago",
        report.history, report.saved_links
    )])
}
