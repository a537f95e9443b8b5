//! In-memory collaborators shared by the unit tests.

use crate::models::{Collection, Item, MediaKind, RawMedia, RawMessage};
use crate::source::{MediaTransfer, MessageSource, SourceError, TransferError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What the fake transfer does for one item.
#[derive(Debug, Clone)]
pub enum Script {
    Bytes(Vec<u8>),
    NoFile,
    Fail(String),
    RateLimit(Duration),
    /// Rate-limits the first attempt, then behaves like an unscripted item.
    RateLimitOnce(Duration),
    /// Reports a path that does not exist.
    Phantom,
}

/// Bytes unique to `id`, `size` long.
pub fn content_for(id: u64, size: u64) -> Vec<u8> {
    let seed = id.to_le_bytes();
    (0..size)
        .map(|i| seed[(i % 8) as usize] ^ (i / 8) as u8)
        .collect()
}

#[derive(Default)]
pub struct MemoryTransfer {
    scripts: HashMap<u64, Script>,
    attempts: Mutex<Vec<u64>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    chunk: usize,
}

impl MemoryTransfer {
    pub fn new() -> Self {
        Self {
            chunk: 4,
            ..Self::default()
        }
    }

    pub fn with(mut self, item_id: u64, script: Script) -> Self {
        self.scripts.insert(item_id, script);
        self
    }

    pub fn calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Item ids in the order their transfers started.
    pub fn attempts(&self) -> Vec<u64> {
        self.attempts.lock().unwrap().clone()
    }

    /// Most transfers observed running at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn write(
        &self,
        item: &Item,
        dir: &Path,
        bytes: &[u8],
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<Option<PathBuf>, TransferError> {
        let path = dir.join(item.local_file_name());
        let mut written = Vec::with_capacity(bytes.len());
        for chunk in bytes.chunks(self.chunk.max(1)) {
            written.extend_from_slice(chunk);
            on_progress(written.len() as u64, item.size);
            tokio::task::yield_now().await;
        }
        tokio::fs::write(&path, &written).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl MediaTransfer for MemoryTransfer {
    async fn transfer(
        &self,
        item: &Item,
        destination_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<Option<PathBuf>, TransferError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(item.id);
            attempts.iter().filter(|id| **id == item.id).count()
        };
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        // Unscripted content is only built when it is actually written.
        let result = match self.scripts.get(&item.id) {
            None => {
                let content = content_for(item.id, item.size);
                self.write(item, destination_dir, &content, on_progress).await
            }
            Some(Script::Bytes(bytes)) => {
                self.write(item, destination_dir, bytes, on_progress).await
            }
            Some(Script::NoFile) => Ok(None),
            Some(Script::Fail(reason)) => Err(TransferError::Failed(reason.clone())),
            Some(Script::RateLimit(wait)) => Err(TransferError::RateLimited { wait: *wait }),
            Some(Script::RateLimitOnce(wait)) if attempt == 1 => {
                Err(TransferError::RateLimited { wait: *wait })
            }
            Some(Script::RateLimitOnce(_)) => {
                let content = content_for(item.id, item.size);
                self.write(item, destination_dir, &content, on_progress).await
            }
            Some(Script::Phantom) => Ok(Some(destination_dir.join("missing.bin"))),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A fixed history served newest-first.
pub struct MemorySource {
    messages: Vec<RawMessage>,
    pages: AtomicUsize,
}

impl MemorySource {
    /// Media messages listed in `sizes` order, newest first: the message at
    /// position `i` has id `sizes.len() - i`.
    pub fn with_sizes(sizes: &[u64]) -> Self {
        let count = sizes.len() as u64;
        let messages: Vec<RawMessage> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| RawMessage {
                id: count - i as u64,
                media: Some(RawMedia {
                    kind: MediaKind::Document,
                    size: *size,
                    file_name: None,
                }),
            })
            .collect();
        Self {
            messages,
            pages: AtomicUsize::new(0),
        }
    }

    pub fn pages_served(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn list_page(
        &self,
        _collection: &Collection,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError> {
        self.pages.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .messages
            .iter()
            .filter(|m| before.map_or(true, |b| m.id < b))
            .take(limit)
            .cloned()
            .collect())
    }
}
