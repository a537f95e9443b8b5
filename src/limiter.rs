// src/limiter.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of transfers allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// A counting gate on simultaneous transfers, shared across all workers of a run.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    state: Arc<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    /// Slots currently held.
    in_flight: AtomicUsize,
    /// Highest value `in_flight` has reached.
    peak: AtomicUsize,
}

/// A held slot. Dropping it gives the slot back.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    state: Arc<LimiterState>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `capacity` slots. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(LimiterState {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Slot {
        // The semaphore is private to this limiter and never closed.
        let permit = self
            .state
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);
        Slot {
            _permit: permit,
            state: self.state.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.state.semaphore.available_permits()
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so in_flight never lags behind
        // a freshly admitted holder.
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn slots_are_returned_on_drop() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.available(), 0);

        drop(a);
        assert_eq!(limiter.in_flight(), 1);
        assert_eq!(limiter.available(), 1);
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn acquire_waits_for_a_free_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.acquire().await;

        let waiting = tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        let slot = tokio::time::timeout(Duration::from_millis(200), limiter.acquire()).await;
        assert!(slot.is_ok());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(ConcurrencyLimiter::new(0).capacity(), 1);
        assert_eq!(ConcurrencyLimiter::default().capacity(), DEFAULT_MAX_CONCURRENT);
    }
}
