// src/worker.rs

//! One item's trip through the pipeline: size gate, transfer, hash, dedup,
//! integrity check, outcome.

use crate::integrity::{sha256_sum, verify_size};
use crate::ledger::{DedupLedger, LedgerCheck};
use crate::limiter::ConcurrencyLimiter;
use crate::models::{Collection, Item, OutcomeRecord, TransferOutcome};
use crate::progress::ProgressAggregator;
use crate::sink::OutcomeSink;
use crate::source::{MediaTransfer, TransferError};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Upstream asked for a pause; the whole cycle must start over.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("rate limited, waited {wait:?}")]
pub struct RateLimited {
    pub wait: Duration,
}

/// Everything a worker shares with its siblings in a cycle.
pub struct WorkerContext<'a> {
    pub collection: &'a Collection,
    pub destination_dir: &'a Path,
    pub transfer: &'a dyn MediaTransfer,
    pub limiter: &'a ConcurrencyLimiter,
    pub ledger: &'a DedupLedger,
    pub progress: &'a ProgressAggregator,
    pub sink: &'a dyn OutcomeSink,
    pub max_item_size: u64,
}

impl WorkerContext<'_> {
    fn finish(
        &self,
        item: &Item,
        file_index: usize,
        total_files: usize,
        outcome: TransferOutcome,
        detail: Option<String>,
    ) -> TransferOutcome {
        self.sink.record(OutcomeRecord {
            file_index,
            total_files,
            item_id: item.id,
            collection: self.collection.display_name(),
            outcome,
            detail,
        });
        outcome
    }
}

/// Drives one item to its terminal outcome.
///
/// Per-item failures become outcomes; only a rate-limit signal is returned as
/// an error, after sleeping for the requested time.
pub async fn run_item(
    ctx: &WorkerContext<'_>,
    item: &Item,
    file_index: usize,
    total_files: usize,
) -> Result<TransferOutcome, RateLimited> {
    if item.is_oversize(ctx.max_item_size) {
        let detail = format!("{} bytes", item.size);
        return Ok(ctx.finish(
            item,
            file_index,
            total_files,
            TransferOutcome::SkippedOversize,
            Some(detail),
        ));
    }

    // Held until this function returns, whatever the outcome.
    let _slot = ctx.limiter.acquire().await;
    debug!(item_id = item.id, file_index, "Starting transfer");

    ctx.progress.track(item.id, item.size);
    let progress = ctx.progress.clone();
    let item_id = item.id;
    let mut on_progress = move |bytes_so_far: u64, _total: u64| {
        progress.report(item_id, bytes_so_far);
    };

    let path = match ctx
        .transfer
        .transfer(item, ctx.destination_dir, &mut on_progress)
        .await
    {
        Ok(Some(path)) => path,
        Ok(None) => {
            return Ok(ctx.finish(
                item,
                file_index,
                total_files,
                TransferOutcome::FailedTransfer,
                Some("transfer produced no file".into()),
            ));
        }
        Err(TransferError::RateLimited { wait }) => {
            warn!(item_id = item.id, ?wait, "Rate limited, waiting before restart");
            tokio::time::sleep(wait).await;
            return Err(RateLimited { wait });
        }
        Err(e) => {
            error!(item_id = item.id, collection = %ctx.collection.name, error = %e, "Transfer failed");
            return Ok(ctx.finish(
                item,
                file_index,
                total_files,
                TransferOutcome::FailedTransfer,
                Some(e.to_string()),
            ));
        }
    };

    let digest = match sha256_sum(&path).await {
        Ok(digest) => digest,
        Err(e) => {
            return Ok(ctx.finish(
                item,
                file_index,
                total_files,
                TransferOutcome::FailedHash,
                Some(format!("{}: {e}", path.display())),
            ));
        }
    };

    if let LedgerCheck::Duplicate(kept) = ctx.ledger.check_and_record(&digest, item.id, &path) {
        if kept == path {
            warn!(item_id = item.id, path = %path.display(), "Duplicate landed on the kept copy, leaving it");
        } else if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Could not remove duplicate file");
        }
        return Ok(ctx.finish(
            item,
            file_index,
            total_files,
            TransferOutcome::SkippedDuplicate,
            Some(format!("same content as {}", kept.display())),
        ));
    }

    let outcome = match verify_size(&path, item.size).await {
        Ok(true) => {
            ctx.progress.finalize(item.id);
            ctx.finish(item, file_index, total_files, TransferOutcome::Completed, None)
        }
        Ok(false) => ctx.finish(
            item,
            file_index,
            total_files,
            TransferOutcome::FailedIntegrity,
            Some(format!("expected {} bytes", item.size)),
        ),
        Err(e) => ctx.finish(
            item,
            file_index,
            total_files,
            TransferOutcome::FailedIntegrity,
            Some(e.to_string()),
        ),
    };
    Ok(outcome)
}
