use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use keepsync_core::LinkStatus;

#[derive(Parser)]
#[command(name = "keepsync")]
#[command(about = "Keep download history and saved links in sync across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local snapshots
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// CLI profile name for backend configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record and browse download history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Manage links saved for later
    Links {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Push local changes and pull remote ones
    Sync {
        /// Sync a single collection
        #[arg(long, value_enum)]
        only: Option<CollectionArg>,
        /// Print progress events to stderr
        #[arg(long)]
        progress: bool,
    },
    /// Purge old deleted records
    Gc {
        /// Keep deleted records younger than this many days
        #[arg(long, default_value = "30")]
        retention_days: u32,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Record a finished download
    Add {
        /// Downloaded URL
        url: String,
        /// Downloader that handled the URL
        #[arg(short, long, default_value = "unspecified")]
        downloader: String,
        /// Number of media items saved
        #[arg(short, long, default_value = "1")]
        media_count: u32,
        /// Record the download as failed
        #[arg(long)]
        failed: bool,
    },
    /// List recent downloads
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Include deleted entries awaiting sync or cleanup
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Delete every entry
    Clear,
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Save a link
    Add {
        /// Link URL
        url: String,
        /// Downloader to use later
        #[arg(short, long, default_value = "unspecified")]
        downloader: String,
    },
    /// List saved links
    List {
        /// Number of links to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show links with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Include deleted links awaiting sync or cleanup
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the download status of a link
    Status {
        /// Link ID or unique ID prefix
        id: String,
        /// New status
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Delete a link
    Delete {
        /// Link ID or unique ID prefix
        id: String,
    },
    /// Delete every link
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update a profile
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Sync backend base URL
        #[arg(long, value_name = "URL")]
        backend_url: Option<String>,
        /// Shared sync token
        #[arg(long, value_name = "TOKEN")]
        backend_token: Option<String>,
        /// Pull only changes since the last sync instead of the full collection
        #[arg(long, conflicts_with = "full_sync")]
        incremental_sync: bool,
        /// Pull the full collection on every sync (the default)
        #[arg(long)]
        full_sync: bool,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show {
        /// Profile name to show
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollectionArg {
    History,
    Links,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    None,
    Success,
    Failure,
}

impl From<StatusArg> for LinkStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::None => Self::None,
            StatusArg::Success => Self::Success,
            StatusArg::Failure => Self::Failure,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
