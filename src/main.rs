// src/main.rs

use anyhow::{bail, Context, Result};
use channel_archiver::models::select_collection;
use channel_archiver::prelude::*;
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Download every media file of a channel, group or user.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    archive: ArchiveArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the collections the account can see, pick one and archive it.
    List {
        /// Index, name or id to pick without prompting.
        #[arg(long)]
        select: Option<String>,
    },
    /// Archive one collection by id or username.
    Fetch {
        collection: String,
    },
}

#[derive(Debug, Args)]
struct ArchiveArgs {
    /// Base URL of the media API.
    #[arg(long, env = "ARCHIVE_API")]
    api: String,

    /// Directory that receives one folder per collection.
    #[arg(long, env = "DOWNLOAD_ROOT", default_value = "downloads")]
    download_root: PathBuf,

    /// Files launched together per batch.
    #[arg(long, env = "BATCH_SIZE", default_value_t = 20)]
    batch_size: usize,

    /// Transfers allowed in flight at once.
    #[arg(long, env = "MAX_CONCURRENT", default_value_t = 20)]
    max_concurrent: usize,
}

impl ArchiveArgs {
    fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            batch_width: self.batch_size,
            max_concurrent: self.max_concurrent,
            ..ArchiveConfig::new(&self.download_root)
        }
    }
}

/// Terminal rendering of progress events: one total bar plus one bar per
/// transfer in flight.
struct ProgressView {
    multi: MultiProgress,
    total: ProgressBar,
    items: HashMap<u64, ProgressBar>,
    item_style: ProgressStyle,
}

impl ProgressView {
    fn new(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let total = multi.add(ProgressBar::new(0));
        total.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.magenta}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        total.set_message("Total");
        let item_style = ProgressStyle::with_template("{msg:>12} [{bar:30.cyan}] {bytes}/{total_bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        Self {
            multi,
            total,
            items: HashMap::new(),
            item_style,
        }
    }

    fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total, .. } => {
                self.clear_items();
                self.total.set_length(total);
                self.total.set_position(0);
            }
            ProgressEvent::Item { item_id, counter } => {
                let bar = self.items.entry(item_id).or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(counter.total));
                    bar.set_style(self.item_style.clone());
                    bar.set_message(format!("#{item_id}"));
                    bar
                });
                bar.set_length(counter.total);
                bar.set_position(counter.current);
            }
            ProgressEvent::Global(counter) => {
                self.total.set_length(counter.total);
                self.total.set_position(counter.current);
            }
            ProgressEvent::Finished { item_id, counter } => {
                if let Some(bar) = self.items.remove(&item_id) {
                    bar.set_position(counter.current);
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
            }
        }
    }

    /// Drops bars of items that never finished, e.g. failures or an aborted cycle.
    fn clear_items(&mut self) {
        for (_, bar) in self.items.drain() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn finish(&mut self) {
        self.clear_items();
        self.total.finish();
    }
}

fn spawn_progress_view(mut events: mpsc::UnboundedReceiver<ProgressEvent>) -> tokio::task::JoinHandle<()> {
    let mut view = ProgressView::new(ProgressDrawTarget::stderr());
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            view.apply(event);
        }
        view.finish();
    })
}

/// Logs how the progress task ended. Returns whether it ended cleanly.
fn display_finished(result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) if e.is_panic() => {
            error!(error = %e, "Progress display panicked");
            false
        }
        Err(e) => {
            warn!(error = %e, "Progress display was cancelled");
            false
        }
    }
}

async fn choose_collection(http: &HttpSource, select: Option<String>) -> Result<Collection> {
    let collections = http.list_collections().await.context("listing collections")?;
    if collections.is_empty() {
        bail!("no collections available");
    }
    for (i, collection) in collections.iter().enumerate() {
        println!("{}. {} (ID: {})", i + 1, collection.name, collection.id);
    }

    let choice = match select {
        Some(choice) => choice,
        None => {
            println!("Pick a collection by number, name or id:");
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("reading selection")?;
            line
        }
    };

    match select_collection(&collections, &choice) {
        Some(collection) => Ok(collection.clone()),
        None => bail!("no collection matches {:?}", choice.trim()),
    }
}

fn print_report(report: &RunReport) {
    println!("Collection:  {}", report.collection);
    println!("Destination: {}", report.destination.display());
    println!("Media found: {}", report.enumerated);
    println!("Restarts:    {}", report.restarts);
    for outcome in [
        TransferOutcome::Completed,
        TransferOutcome::SkippedOversize,
        TransferOutcome::SkippedDuplicate,
        TransferOutcome::FailedHash,
        TransferOutcome::FailedIntegrity,
        TransferOutcome::FailedTransfer,
    ] {
        println!("{:<17}{}", format!("{outcome:?}:"), report.count(outcome));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.archive.archive_config();

    info!(api = %cli.archive.api, "Connecting to media API");
    let http = Arc::new(HttpSource::new(&cli.archive.api).context("building HTTP client")?);
    let collection = match cli.command {
        Command::List { select } => choose_collection(&http, select).await?,
        Command::Fetch { collection } => http
            .resolve_collection(&collection)
            .await
            .with_context(|| format!("resolving collection {collection}"))?,
    };
    info!(id = collection.id, name = %collection.name, "Collection selected");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let display = spawn_progress_view(events_rx);

    let archiver = Archiver::new(config, http.clone(), http)?
        .with_progress(ProgressAggregator::with_events(events_tx));
    let report = archiver.run(&collection, &LogSink).await?;

    // Dropping the archiver closes the event channel and lets the display finish.
    drop(archiver);
    display_finished(display.await);

    print_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(current: u64, total: u64) -> Counter {
        Counter { current, total }
    }

    #[test]
    fn item_bars_follow_transfers() {
        let mut view = ProgressView::new(ProgressDrawTarget::hidden());
        view.apply(ProgressEvent::Started { items: 2, total: 30 });
        assert_eq!(view.total.length(), Some(30));

        view.apply(ProgressEvent::Item { item_id: 1, counter: counter(4, 10) });
        view.apply(ProgressEvent::Item { item_id: 2, counter: counter(8, 20) });
        view.apply(ProgressEvent::Item { item_id: 1, counter: counter(6, 10) });
        view.apply(ProgressEvent::Global(counter(14, 30)));
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[&1].position(), 6);
        assert_eq!(view.items[&2].length(), Some(20));
        assert_eq!(view.total.position(), 14);

        view.apply(ProgressEvent::Finished { item_id: 1, counter: counter(10, 10) });
        assert_eq!(view.items.len(), 1);
        assert!(!view.items.contains_key(&1));
    }

    #[test]
    fn restart_clears_unfinished_bars() {
        let mut view = ProgressView::new(ProgressDrawTarget::hidden());
        view.apply(ProgressEvent::Started { items: 1, total: 8 });
        view.apply(ProgressEvent::Item { item_id: 5, counter: counter(3, 8) });
        view.apply(ProgressEvent::Global(counter(3, 8)));

        view.apply(ProgressEvent::Started { items: 1, total: 8 });
        assert!(view.items.is_empty());
        assert_eq!(view.total.position(), 0);

        view.finish();
        assert!(view.total.is_finished());
    }

    #[tokio::test]
    async fn display_task_outcome_is_reported() {
        let clean = tokio::spawn(async {});
        assert!(display_finished(clean.await));

        let crashed = tokio::spawn(async { panic!("renderer failed") });
        assert!(!display_finished(crashed.await));

        let cancelled = tokio::spawn(std::future::pending::<()>());
        cancelled.abort();
        assert!(!display_finished(cancelled.await));
    }
}
