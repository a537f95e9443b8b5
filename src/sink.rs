// src/sink.rs

use crate::models::{OutcomeRecord, TransferOutcome};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Receives exactly one record per item the archiver finishes.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, record: OutcomeRecord);
}

impl OutcomeSink for UnboundedSender<OutcomeRecord> {
    fn record(&self, record: OutcomeRecord) {
        let _ = self.send(record);
    }
}

/// Writes outcomes to the log, one line per item.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl OutcomeSink for LogSink {
    fn record(&self, r: OutcomeRecord) {
        let detail = r.detail.as_deref().unwrap_or("");
        match r.outcome {
            TransferOutcome::Completed => info!(
                "File {}/{} - {} from {} downloaded successfully",
                r.file_index, r.total_files, r.item_id, r.collection
            ),
            TransferOutcome::SkippedOversize => info!(
                "File {}/{} - {} is larger than the size limit, skipping {}",
                r.file_index, r.total_files, r.item_id, detail
            ),
            TransferOutcome::SkippedDuplicate => info!(
                "File {}/{} - {} from {} is a duplicate, skipped {}",
                r.file_index, r.total_files, r.item_id, r.collection, detail
            ),
            TransferOutcome::FailedHash => error!(
                "File {}/{} - {} from {}: hashing failed, duplicate check skipped: {}",
                r.file_index, r.total_files, r.item_id, r.collection, detail
            ),
            TransferOutcome::FailedIntegrity => error!(
                "File {}/{} - {} from {} downloaded but integrity check failed: {}",
                r.file_index, r.total_files, r.item_id, r.collection, detail
            ),
            TransferOutcome::FailedTransfer => warn!(
                "File {}/{} - {} from {}: download failed: {}",
                r.file_index, r.total_files, r.item_id, r.collection, detail
            ),
        }
    }
}
