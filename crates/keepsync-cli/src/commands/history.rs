use keepsync_core::models::DEFAULT_DOWNLOADER;
use keepsync_core::services::Library;
use keepsync_core::sync::SyncTransport;
use keepsync_core::util::normalize_text_option;
use keepsync_core::HistoryEntry;

use crate::cli::HistoryCommands;
use crate::commands::common::{
    format_history_lines, history_to_list_item, normalize_url, resolve_record_id, select_records,
    Context, HistoryListItem,
};
use crate::error::CliError;

pub async fn run_history(command: HistoryCommands, context: &Context) -> Result<(), CliError> {
    let library = context.open_library().await?;
    let output = execute_history(command, &library).await?;
    library.flush().await?;

    for line in output {
        println!("{line}");
    }
    Ok(())
}

pub async fn execute_history<T: SyncTransport + Clone>(
    command: HistoryCommands,
    library: &Library<T>,
) -> Result<Vec<String>, CliError> {
    let mut store = library.history().lock().await;

    match command {
        HistoryCommands::Add {
            url,
            downloader,
            media_count,
            failed,
        } => {
            let url = normalize_url(&url)?;
            let downloader = normalize_text_option(Some(downloader))
                .unwrap_or_else(|| DEFAULT_DOWNLOADER.to_string());
            let record = store.add(HistoryEntry::new(url, downloader, !failed, media_count));
            Ok(vec![record.id.to_string()])
        }
        HistoryCommands::List { limit, all, json } => {
            let now = store.now();
            let records = select_records(store.records(), all, limit, |_| true);

            if json {
                let items = records
                    .iter()
                    .map(|record| history_to_list_item(record, now))
                    .collect::<Vec<HistoryListItem>>();
                Ok(vec![serde_json::to_string_pretty(&items)?])
            } else if records.is_empty() {
                Ok(vec!["No history entries.".to_string()])
            } else {
                Ok(format_history_lines(&records, now))
            }
        }
        HistoryCommands::Delete { id } => {
            let id = resolve_record_id(store.records(), &id)?;
            store.soft_delete(&id);
            Ok(vec![id.to_string()])
        }
        HistoryCommands::Clear => {
            let deleted = store.clear();
            Ok(vec![format!("Deleted {deleted} history entries")])
        }
    }
}
