// src/source.rs

//! Seams to the outside world: listing a collection's history and fetching
//! one item's bytes. Everything transport-specific lives behind these traits.

use crate::models::{Collection, Item, RawMessage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("collection not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// Upstream asked us to back off before making further requests.
    #[error("rate limited, retry after {wait:?}")]
    RateLimited { wait: Duration },
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

impl TransferError {
    pub fn rate_limit_wait(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait } => Some(*wait),
            _ => None,
        }
    }
}

/// Paginated access to a collection's message history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Returns up to `limit` messages with ids strictly below `before`
    /// (newest first), or the newest messages when `before` is `None`.
    /// An empty page means the history is exhausted.
    async fn list_page(
        &self,
        collection: &Collection,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError>;
}

/// Streams one item's bytes into `destination_dir`.
#[async_trait]
pub trait MediaTransfer: Send + Sync {
    /// Calls `on_progress(bytes_so_far, total)` as data arrives and returns the
    /// written path, or `None` when nothing was written.
    async fn transfer(
        &self,
        item: &Item,
        destination_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<Option<PathBuf>, TransferError>;
}
