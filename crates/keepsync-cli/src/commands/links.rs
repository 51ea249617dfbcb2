use keepsync_core::models::DEFAULT_DOWNLOADER;
use keepsync_core::services::Library;
use keepsync_core::sync::SyncTransport;
use keepsync_core::util::normalize_text_option;
use keepsync_core::{LinkStatus, SavedLink};

use crate::cli::LinkCommands;
use crate::commands::common::{
    format_link_lines, link_to_list_item, normalize_url, resolve_record_id, select_records,
    Context, LinkListItem,
};
use crate::error::CliError;

pub async fn run_links(command: LinkCommands, context: &Context) -> Result<(), CliError> {
    let library = context.open_library().await?;
    let output = execute_links(command, &library).await?;
    library.flush().await?;

    for line in output {
        println!("{line}");
    }
    Ok(())
}

pub async fn execute_links<T: SyncTransport + Clone>(
    command: LinkCommands,
    library: &Library<T>,
) -> Result<Vec<String>, CliError> {
    let mut store = library.saved_links().lock().await;

    match command {
        LinkCommands::Add { url, downloader } => {
            let url = normalize_url(&url)?;
            let downloader = normalize_text_option(Some(downloader))
                .unwrap_or_else(|| DEFAULT_DOWNLOADER.to_string());
            let record = store.add(SavedLink::new(url, downloader));
            Ok(vec![record.id.to_string()])
        }
        LinkCommands::List {
            limit,
            status,
            all,
            json,
        } => {
            let now = store.now();
            let status = status.map(LinkStatus::from);
            let records = select_records(store.records(), all, limit, |link| {
                status.is_none_or(|status| link.status == status)
            });

            if json {
                let items = records
                    .iter()
                    .map(|record| link_to_list_item(record, now))
                    .collect::<Vec<LinkListItem>>();
                Ok(vec![serde_json::to_string_pretty(&items)?])
            } else if records.is_empty() {
                Ok(vec!["No saved links.".to_string()])
            } else {
                Ok(format_link_lines(&records, now))
            }
        }
        LinkCommands::Status { id, status } => {
            let id = resolve_record_id(store.records(), &id)?;
            let status = LinkStatus::from(status);
            store
                .update(&id, |link| link.status = status)
                .ok_or_else(|| CliError::RecordNotFound(id.to_string()))?;
            Ok(vec![format!("{id} {status}")])
        }
        LinkCommands::Delete { id } => {
            let id = resolve_record_id(store.records(), &id)?;
            store.soft_delete(&id);
            Ok(vec![id.to_string()])
        }
        LinkCommands::Clear => {
            let deleted = store.clear();
            Ok(vec![format!("Deleted {deleted} saved links")])
        }
    }
}
