// src/manager.rs

use crate::config::{ArchiveConfig, ConfigError};
use crate::enumerator::enumerate;
use crate::ledger::DedupLedger;
use crate::limiter::ConcurrencyLimiter;
use crate::models::{Collection, TransferOutcome};
use crate::progress::{Counter, ProgressAggregator};
use crate::queue::plan_batches;
use crate::sink::OutcomeSink;
use crate::source::{MediaTransfer, MessageSource};
use crate::worker::{run_item, RateLimited, WorkerContext};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot create {path}: {source}")]
    Destination {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Summary of a finished run. Counts describe the last cycle only, since a
/// rate-limit restart re-attempts every item.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub collection: String,
    pub destination: PathBuf,
    pub restarts: u32,
    pub enumerated: usize,
    pub outcomes: HashMap<TransferOutcome, usize>,
    pub bytes: Counter,
}

impl RunReport {
    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_failure())
            .map(|(_, count)| count)
            .sum()
    }
}

enum Cycle {
    Finished {
        enumerated: usize,
        outcomes: HashMap<TransferOutcome, usize>,
    },
    RateLimited(Duration),
}

/// Enumerates a collection and fetches its media in batches under a global
/// concurrency cap.
pub struct Archiver {
    config: ArchiveConfig,
    source: Arc<dyn MessageSource>,
    transfer: Arc<dyn MediaTransfer>,
    limiter: ConcurrencyLimiter,
    progress: ProgressAggregator,
}

impl Archiver {
    pub fn new(
        config: ArchiveConfig,
        source: Arc<dyn MessageSource>,
        transfer: Arc<dyn MediaTransfer>,
    ) -> Result<Self, ArchiveError> {
        config.validate()?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrent);
        Ok(Self {
            config,
            source,
            transfer,
            limiter,
            progress: ProgressAggregator::new(),
        })
    }

    /// Replaces the progress aggregator, e.g. with one that publishes events.
    pub fn with_progress(mut self, progress: ProgressAggregator) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// Fetches every media item of `collection`, restarting from scratch each
    /// time a worker reports a rate limit.
    pub async fn run(
        &self,
        collection: &Collection,
        sink: &dyn OutcomeSink,
    ) -> Result<RunReport, ArchiveError> {
        let destination = self.config.download_root.join(collection.folder_name());
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|source| ArchiveError::Destination {
                path: destination.clone(),
                source,
            })?;

        // Shared by every cycle of this run.
        let ledger = DedupLedger::new();
        let mut restarts = 0;

        loop {
            match self.cycle(collection, &destination, &ledger, sink).await {
                Cycle::Finished {
                    enumerated,
                    outcomes,
                } => {
                    return Ok(RunReport {
                        collection: collection.display_name(),
                        destination,
                        restarts,
                        enumerated,
                        outcomes,
                        bytes: self.progress.global(),
                    });
                }
                Cycle::RateLimited(wait) => {
                    restarts += 1;
                    warn!(
                        collection = %collection.name,
                        ?wait,
                        restarts,
                        "Rate limited, restarting from the beginning of the collection"
                    );
                }
            }
        }
    }

    async fn cycle(
        &self,
        collection: &Collection,
        destination: &Path,
        ledger: &DedupLedger,
        sink: &dyn OutcomeSink,
    ) -> Cycle {
        let items = enumerate(self.source.as_ref(), collection, self.config.page_size).await;
        let total_files = items.len();
        let mut outcomes = HashMap::new();

        // Declared sizes come from upstream and may be absurd.
        let total_size = items.iter().map(|item| item.size).fold(0, u64::saturating_add);
        self.progress.begin(total_files, total_size);

        if items.is_empty() {
            info!(collection = %collection.name, "No media found");
            return Cycle::Finished {
                enumerated: 0,
                outcomes,
            };
        }

        info!(
            files = total_files,
            total_size, "Starting download of media files"
        );

        let ctx = WorkerContext {
            collection,
            destination_dir: destination,
            transfer: self.transfer.as_ref(),
            limiter: &self.limiter,
            ledger,
            progress: &self.progress,
            sink,
            max_item_size: self.config.max_item_size,
        };

        for batch in plan_batches(&items, self.config.batch_width) {
            let results = join_all(
                batch
                    .iter()
                    .map(|queued| run_item(&ctx, queued.item, queued.file_index, total_files)),
            )
            .await;

            let mut limited = None;
            for result in results {
                match result {
                    Ok(outcome) => *outcomes.entry(outcome).or_insert(0) += 1,
                    Err(RateLimited { wait }) => {
                        limited = Some(limited.map_or(wait, |w: Duration| w.max(wait)));
                    }
                }
            }
            if let Some(wait) = limited {
                return Cycle::RateLimited(wait);
            }
        }

        Cycle::Finished {
            enumerated: total_files,
            outcomes,
        }
    }
}
