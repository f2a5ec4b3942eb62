//! podindex - download, unpack, index and search the PodcastIndex feeds database.

mod commands;

use clap::{Parser, Subcommand};
use podindex_core::config::{default_database_path, SearchDefaults, SourceConfig};
use podindex_core::PodindexError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "podindex")]
#[command(about = "Full-text search over the PodcastIndex feeds database")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the database archive
    Download {
        #[arg(long, default_value = SourceConfig::DOWNLOAD_URL)]
        url: String,

        /// Destination file (defaults to the URL's file name)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Write buffer size in bytes
        #[arg(long, default_value_t = SourceConfig::DOWNLOAD_CHUNK_SIZE)]
        chunk_size: usize,

        /// Do not log transfer progress
        #[arg(long)]
        no_progress: bool,
    },

    /// Extract the database file from the downloaded archive
    Unpack {
        #[arg(long, default_value_os_t = default_archive_path())]
        path: PathBuf,

        /// Archive member to extract (defaults to the archive name without extension)
        #[arg(long)]
        db_name: Option<String>,

        #[arg(long, default_value = ".")]
        out_path: PathBuf,
    },

    /// Create and populate the full-text index
    SetupIndex {
        #[arg(long, default_value_os_t = default_database_path())]
        db: PathBuf,

        #[arg(long, default_value = SearchDefaults::TABLE)]
        table: String,

        #[arg(long, num_args = 1.., default_values_t = default_search_fields())]
        fields: Vec<String>,

        /// Do not log population progress
        #[arg(long)]
        no_progress: bool,
    },

    /// Search the index for a term
    Search {
        term: String,

        #[arg(long, num_args = 1.., default_values_t = default_out_fields())]
        out_fields: Vec<String>,

        #[arg(long, default_value_os_t = default_database_path())]
        db: PathBuf,

        #[arg(long, default_value = SearchDefaults::TABLE)]
        table: String,

        #[arg(long, num_args = 1.., default_values_t = default_search_fields())]
        fields: Vec<String>,
    },
}

fn default_search_fields() -> Vec<String> {
    SearchDefaults::SEARCH_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_out_fields() -> Vec<String> {
    SearchDefaults::OUT_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_archive_path() -> PathBuf {
    podindex_core::config::archive_file_name(SourceConfig::DOWNLOAD_URL)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("podcastindex_feeds.db.tgz"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match commands::run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<PodindexError>()
                .map(PodindexError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
