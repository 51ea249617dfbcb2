use std::sync::Arc;

use keepsync_core::sync::{SyncError, SyncOutcome, SyncProgress, SyncResult};

use crate::cli::CollectionArg;
use crate::commands::common::{format_timestamp, Context};
use crate::error::CliError;

pub async fn run_sync(
    only: Option<CollectionArg>,
    progress: bool,
    context: &Context,
) -> Result<(), CliError> {
    let mut library = context.open_library().await?;
    if progress {
        library = library.with_progress(Arc::new(|event: &SyncProgress| {
            eprintln!("{}", format_progress(event));
        }));
    }

    let results = match only {
        Some(CollectionArg::History) => vec![("history", library.history_sync().sync().await)],
        Some(CollectionArg::Links) => {
            vec![("saved_links", library.saved_links_sync().sync().await)]
        }
        None => {
            let report = library.sync_all().await;
            vec![
                ("history", report.history),
                ("saved_links", report.saved_links),
            ]
        }
    };
    library.flush().await?;

    for (collection, result) in &results {
        println!("{}", format_sync_line(collection, result));
    }

    match sync_failure(&results) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

pub fn format_sync_line(collection: &str, result: &SyncResult<SyncOutcome>) -> String {
    match result {
        Ok(SyncOutcome::Completed(report)) => format!(
            "{collection}: pushed {}, pulled {} ({} new, {} updated, {} skipped), synced at {}",
            report.pushed,
            report.pulled,
            report.merge.inserted,
            report.merge.updated,
            report.merge.skipped,
            format_timestamp(report.synced_at)
        ),
        Ok(SyncOutcome::AlreadyRunning) => format!("{collection}: sync already running"),
        Err(error) => format!("{collection}: {error}"),
    }
}

pub fn format_progress(event: &SyncProgress) -> String {
    let collection = event.collection();
    match event {
        SyncProgress::Started { .. } => format!("[{collection}] starting"),
        SyncProgress::Pushing { count, .. } => format!("[{collection}] pushing {count} changes"),
        SyncProgress::Received { count, .. } => {
            format!("[{collection}] received {count} records")
        }
        SyncProgress::Merged {
            inserted,
            updated,
            skipped,
            ..
        } => format!("[{collection}] merged {inserted} new, {updated} updated, {skipped} skipped"),
        SyncProgress::Completed { synced_at, .. } => {
            format!("[{collection}] done at {}", format_timestamp(*synced_at))
        }
        SyncProgress::Failed { message, .. } => format!("[{collection}] failed: {message}"),
    }
}

/// Error to exit with, if any collection failed.
///
/// Missing configuration on every failing collection is reported as such;
/// anything else becomes a generic sync failure.
pub fn sync_failure(results: &[(&str, SyncResult<SyncOutcome>)]) -> Option<CliError> {
    let failures = results
        .iter()
        .filter_map(|(collection, result)| result.as_ref().err().map(|error| (*collection, error)))
        .collect::<Vec<_>>();

    if failures.is_empty() {
        return None;
    }
    if failures
        .iter()
        .all(|(_, error)| matches!(error, SyncError::Configuration(_)))
    {
        return Some(CliError::SyncNotConfigured);
    }

    let message = failures
        .iter()
        .map(|(collection, error)| format!("{collection}: {error}"))
        .collect::<Vec<_>>()
        .join("; ");
    Some(CliError::SyncFailed(message))
}
