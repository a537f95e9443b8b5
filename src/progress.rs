// src/progress.rs

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

/// A current/total byte pair.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Counter {
    pub current: u64,
    pub total: u64,
}

impl Counter {
    pub fn new(total: u64) -> Self {
        Self { current: 0, total }
    }

    /// Adds `delta`, never going past `total`. Returns the bytes actually applied.
    fn advance(&mut self, delta: u64) -> u64 {
        let applied = delta.min(self.total.saturating_sub(self.current));
        self.current += applied;
        applied
    }

    /// Fraction done in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Progress notifications for whoever renders them.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A new cycle fixed the global total.
    Started { items: usize, total: u64 },
    Item { item_id: u64, counter: Counter },
    Global(Counter),
    /// The item's counter was snapped to its total after completion.
    Finished { item_id: u64, counter: Counter },
}

#[derive(Debug, Default)]
struct ProgressState {
    global: Counter,
    items: HashMap<u64, ItemEntry>,
}

#[derive(Debug, Default)]
struct ItemEntry {
    counter: Counter,
    /// Last absolute `bytes_so_far` the transfer reported.
    reported: u64,
}

/// Per-item and global byte counters shared by every worker of a run.
///
/// All mutation goes through short synchronous sections; nothing here awaits
/// while holding the lock.
#[derive(Clone, Debug, Default)]
pub struct ProgressAggregator {
    state: Arc<Mutex<ProgressState>>,
    events: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator that also pushes every change to `events`.
    pub fn with_events(events: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            state: Arc::default(),
            events: Some(events),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }

    /// Resets all counters and fixes the global total for a new cycle.
    pub fn begin(&self, items: usize, total: u64) {
        {
            let mut state = self.lock();
            state.global = Counter::new(total);
            state.items.clear();
        }
        self.emit(ProgressEvent::Started { items, total });
    }

    /// Registers an item tracker with its declared size, resetting any earlier one.
    pub fn track(&self, item_id: u64, total: u64) {
        self.lock().items.insert(
            item_id,
            ItemEntry {
                counter: Counter::new(total),
                reported: 0,
            },
        );
    }

    /// Feeds an absolute `bytes_so_far` from a transfer callback.
    ///
    /// Only the increase since the item's previous report is applied, to the item
    /// and to the global counter, both clamped at their totals.
    pub fn report(&self, item_id: u64, bytes_so_far: u64) {
        let (item, global) = {
            let mut state = self.lock();
            let Some(entry) = state.items.get_mut(&item_id) else {
                return;
            };
            let delta = bytes_so_far.saturating_sub(entry.reported);
            if delta == 0 {
                return;
            }
            entry.reported = bytes_so_far;
            entry.counter.advance(delta);
            let item = entry.counter;
            state.global.advance(delta);
            (item, state.global)
        };
        self.emit(ProgressEvent::Item { item_id, counter: item });
        self.emit(ProgressEvent::Global(global));
    }

    /// Snaps a completed item's counter to its total.
    pub fn finalize(&self, item_id: u64) {
        let counter = {
            let mut state = self.lock();
            let Some(entry) = state.items.get_mut(&item_id) else {
                return;
            };
            entry.counter.current = entry.counter.total;
            entry.counter
        };
        self.emit(ProgressEvent::Finished { item_id, counter });
    }

    pub fn global(&self) -> Counter {
        self.lock().global
    }

    pub fn item(&self, item_id: u64) -> Option<Counter> {
        self.lock().items.get(&item_id).map(|entry| entry.counter)
    }
}
