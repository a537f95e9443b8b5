pub mod config;
pub mod downloader;
pub mod enumerator;
pub mod integrity;
pub mod ledger;
pub mod limiter;
pub mod manager;
pub mod models;
pub mod progress;
pub mod queue;
pub mod sink;
pub mod source;
pub mod worker;

#[cfg(test)]
mod testing;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::config::ArchiveConfig;
    pub use crate::downloader::HttpSource;
    pub use crate::manager::{ArchiveError, Archiver, RunReport};
    pub use crate::models::{Collection, DisplayName, Item, OutcomeRecord, TransferOutcome};
    pub use crate::progress::{Counter, ProgressAggregator, ProgressEvent};
    pub use crate::sink::{LogSink, OutcomeSink};
    pub use crate::source::{MediaTransfer, MessageSource, SourceError, TransferError};
}
