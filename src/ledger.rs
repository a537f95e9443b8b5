// src/ledger.rs

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of offering a freshly hashed file to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCheck {
    /// First file with this digest; it is now the kept copy.
    Recorded,
    /// The same item was recorded before at the same path (a re-fetch).
    AlreadyKept,
    /// Another item with this digest is already kept at the given path.
    Duplicate(PathBuf),
}

/// The file that holds a digest's content on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeptCopy {
    item_id: u64,
    path: PathBuf,
}

type Entries = HashMap<String, Option<KeptCopy>>;

/// Run-scoped set of content digests already accepted.
///
/// Each digest remembers which item was kept and where, so a re-fetch of that
/// item onto the same path is not mistaken for a duplicate of itself.
#[derive(Clone, Debug, Default)]
pub struct DedupLedger {
    entries: Arc<Mutex<Entries>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Critical sections never panic, but a poisoned map is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.lock().contains_key(digest)
    }

    /// Marks a digest as seen. Idempotent.
    pub fn record(&self, digest: &str) {
        self.lock().entry(digest.to_string()).or_insert(None);
    }

    /// Checks and inserts in a single critical section.
    pub fn check_and_record(&self, digest: &str, item_id: u64, path: &Path) -> LedgerCheck {
        let offered = KeptCopy {
            item_id,
            path: path.to_path_buf(),
        };
        let mut entries = self.lock();
        match entries.entry(digest.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Some(offered));
                LedgerCheck::Recorded
            }
            Entry::Occupied(mut occupied) => {
                let kept = occupied.get_mut();
                if let Some(copy) = kept.as_ref() {
                    return if *copy == offered {
                        LedgerCheck::AlreadyKept
                    } else {
                        LedgerCheck::Duplicate(copy.path.clone())
                    };
                }
                // Seen without a file: this one becomes the kept copy.
                *kept = Some(offered);
                LedgerCheck::Recorded
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
