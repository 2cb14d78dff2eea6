//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use tracker_core::{DownloadStatus, FileType, SortBy, SortOrder};

/// Replay host download events and print the reconciled download list.
///
/// Events are read as JSON lines (`created`, `changed`, `erased`) from a file
/// or from stdin, applied in order, and the resulting page is printed.
#[derive(Parser, Debug)]
#[command(name = "download-tracker")]
#[command(author, version, about)]
pub struct Args {
    /// Event log to replay (JSON lines); `-` or omitted reads stdin
    pub events: Option<PathBuf>,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/download-tracker/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only show downloads with this status
    #[arg(long)]
    pub status: Option<DownloadStatus>,

    /// Only show downloads of this file type
    #[arg(long)]
    pub file_type: Option<FileType>,

    /// Case-insensitive text matched against the file name
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort key: name, size or time
    #[arg(long, default_value_t = SortBy::Time)]
    pub sort: SortBy,

    /// Sort direction: asc or desc
    #[arg(long, default_value_t = SortOrder::Desc)]
    pub order: SortOrder,

    /// Page to print (1-based)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: Option<u64>,

    /// Records per page (1-500)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=500))]
    pub page_size: Option<u64>,

    /// Print the page and stats as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
