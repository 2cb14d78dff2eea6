//! CLI entry point for the download tracker.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracker_core::{
    DownloadRecord, DownloadSession, FilterOptions, HostEvent, MemoryHost, Page, SortOptions,
    Stats, TrackerConfig, format_file_size, format_speed,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = TrackerConfig::load_or_default(args.config.as_deref());
    let input = read_events_input(&args)?;
    let events = parse_events(&input)?;
    info!(events = events.len(), "Replaying host events");

    let host = Arc::new(MemoryHost::new());
    let mut session = DownloadSession::new(host.clone(), &config);
    for event in events {
        host.observe(&event);
        session.handle_event(event).await;
    }
    session.settle().await;

    session.set_filter(FilterOptions {
        status: args.status,
        file_type: args.file_type,
        search_text: args.search.clone(),
    });
    session.set_sort(SortOptions {
        sort_by: args.sort,
        sort_order: args.order,
    });
    if let Some(page_size) = args.page_size {
        session.set_page_size(usize::try_from(page_size)?);
    }
    if let Some(page) = args.page {
        session.set_current_page(usize::try_from(page)?);
    }

    let page = session.page();
    let stats = session.stats();
    if args.json {
        let report = serde_json::json!({ "page": page, "stats": stats });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&page, &stats);
    }

    Ok(())
}

fn read_events_input(args: &Args) -> Result<String> {
    match args.events.as_deref() {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read event log '{}'", path.display())),
        Some(_) => read_stdin(),
        None if !io::stdin().is_terminal() => read_stdin(),
        None => {
            info!("No events provided. Pass an event log or pipe JSON lines via stdin.");
            Ok(String::new())
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read events from stdin")?;
    Ok(buffer)
}

/// Parses one event per non-blank line.
fn parse_events(input: &str) -> Result<Vec<HostEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid host event on line {}", index + 1))
        })
        .collect()
}

fn print_table(page: &Page, stats: &Stats) {
    println!(
        "{:>6}  {:<11}  {:>4}  {:>12}  {:>12}  {:<24}  NAME",
        "ID", "STATUS", "%", "SIZE", "SPEED", "HOST"
    );
    for record in &page.items {
        println!(
            "{:>6}  {:<11}  {:>4}  {:>12}  {:>12}  {:<24}  {}",
            record.id,
            record.status.as_str(),
            record.progress,
            format_file_size(record.size),
            format_speed(record.speed),
            source_host(record),
            record.name
        );
    }
    println!(
        "page {}/{} ({} matching) | total {} downloading {} completed {} paused {} failed {}",
        page.current_page,
        page.total_pages.max(1),
        page.total_items,
        stats.total,
        stats.downloading,
        stats.completed,
        stats.paused,
        stats.failed
    );
}

fn source_host(record: &DownloadRecord) -> String {
    url::Url::parse(&record.url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}
