use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::{NexusError, Result};

/// The default growth factor of allocation grants.
pub const DEFAULT_ALLOCATION_FACTOR: u64 = 8;

struct Waiter {
    minimum_byte_count: u64,
    maximum_byte_count: u64,
    tx: oneshot::Sender<u64>,
}

struct TrackerState {
    free: u64,
    waiters: VecDeque<Waiter>,
}

/// A process-wide byte budget for read buffers. Allocations are granted the
/// largest `min * factor^k` that fits the free budget, capped at the
/// requested maximum. When even the minimum does not fit, the request waits
/// in FIFO order; a release wakes the oldest waiter whose minimum fits.
pub struct MemoryTracker {
    total_buffer_memory_consumption: u64,
    factor: u64,
    state: Mutex<TrackerState>,
}

impl MemoryTracker {
    /// Creates a tracker with the production growth factor.
    pub fn new(total_buffer_memory_consumption: u64) -> Arc<Self> {
        Self::with_factor(total_buffer_memory_consumption, DEFAULT_ALLOCATION_FACTOR)
    }

    /// Creates a tracker with a custom growth factor.
    pub fn with_factor(total_buffer_memory_consumption: u64, factor: u64) -> Arc<Self> {
        Arc::new(MemoryTracker {
            total_buffer_memory_consumption,
            factor: factor.max(2),
            state: Mutex::new(TrackerState {
                free: total_buffer_memory_consumption,
                waiters: VecDeque::new(),
            }),
        })
    }

    /// The configured budget.
    pub fn total_buffer_memory_consumption(&self) -> u64 {
        self.total_buffer_memory_consumption
    }

    /// The currently free bytes.
    pub fn free_byte_count(&self) -> u64 {
        self.lock_state().free
    }

    /// Requests between `minimum_byte_count` and `maximum_byte_count`
    /// bytes. The returned token releases its bytes on drop. When the
    /// minimum exceeds the total budget the request fails with
    /// `OutOfMemory`; when it merely does not fit right now, the request
    /// waits until another token is released or the cancellation token
    /// fires.
    pub async fn register_allocation(
        self: &Arc<Self>,
        minimum_byte_count: u64,
        maximum_byte_count: u64,
        cancellation_token: &CancellationToken,
    ) -> Result<AllocationToken> {
        if minimum_byte_count == 0 || minimum_byte_count > maximum_byte_count {
            return Err(NexusError::validation(format!(
                "invalid allocation request: minimum {minimum_byte_count}, maximum {maximum_byte_count}"
            )));
        }

        if minimum_byte_count > self.total_buffer_memory_consumption {
            return Err(NexusError::OutOfMemory(format!(
                "the minimum allocation of {minimum_byte_count} bytes exceeds the budget of {} bytes",
                self.total_buffer_memory_consumption
            )));
        }

        let mut rx = {
            let mut state = self.lock_state();

            match Self::compute_actual(
                minimum_byte_count,
                maximum_byte_count,
                state.free,
                self.factor,
            ) {
                Some(actual_byte_count) => {
                    state.free -= actual_byte_count;
                    trace!(actual_byte_count, free = state.free, "granted allocation");

                    return Ok(AllocationToken {
                        tracker: self.clone(),
                        actual_byte_count,
                    });
                }

                None => {
                    let (tx, rx) = oneshot::channel();

                    state.waiters.push_back(Waiter {
                        minimum_byte_count,
                        maximum_byte_count,
                        tx,
                    });

                    rx
                }
            }
        };

        tokio::select! {
            _ = cancellation_token.cancelled() => {
                // A grant may have raced the cancellation; give it back.
                rx.close();

                if let Ok(actual_byte_count) = rx.try_recv() {
                    self.release(actual_byte_count);
                }

                Err(NexusError::Cancelled)
            }

            granted = &mut rx => match granted {
                Ok(actual_byte_count) => Ok(AllocationToken {
                    tracker: self.clone(),
                    actual_byte_count,
                }),
                Err(_) => Err(NexusError::internal("the memory tracker went away")),
            }
        }
    }

    fn compute_actual(minimum: u64, maximum: u64, free: u64, factor: u64) -> Option<u64> {
        if free < minimum {
            return None;
        }

        let cap = maximum.min(free);
        let mut actual = minimum;

        while actual.saturating_mul(factor) <= cap {
            actual = actual.saturating_mul(factor);
        }

        Some(actual)
    }

    fn release(&self, byte_count: u64) {
        let mut state = self.lock_state();

        state.free = (state.free + byte_count).min(self.total_buffer_memory_consumption);
        trace!(byte_count, free = state.free, "released allocation");

        // Wake the oldest waiters whose minimum fits the free budget.
        let mut index = 0;

        while index < state.waiters.len() {
            let minimum = state.waiters[index].minimum_byte_count;

            if state.free < minimum {
                index += 1;
                continue;
            }

            if let Some(waiter) = state.waiters.remove(index) {
                let actual = Self::compute_actual(
                    waiter.minimum_byte_count,
                    waiter.maximum_byte_count,
                    state.free,
                    self.factor,
                )
                .unwrap_or(waiter.minimum_byte_count);

                state.free -= actual;

                // A closed receiver means the waiter was cancelled.
                if waiter.tx.send(actual).is_err() {
                    state.free += actual;
                }
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A granted allocation. Dropping the token returns its bytes to the pool
/// and wakes waiting allocations.
pub struct AllocationToken {
    tracker: Arc<MemoryTracker>,
    actual_byte_count: u64,
}

impl AllocationToken {
    /// The granted byte count, between the requested minimum and maximum.
    pub fn actual_byte_count(&self) -> u64 {
        self.actual_byte_count
    }
}

impl Drop for AllocationToken {
    fn drop(&mut self) {
        self.tracker.release(self.actual_byte_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_grow_by_the_factor_up_to_the_maximum() {
        let tracker = MemoryTracker::with_factor(1000, 2);
        let token = tracker
            .register_allocation(100, 700, &CancellationToken::new())
            .await
            .unwrap();

        // 100 -> 200 -> 400; 800 would exceed the maximum of 700.
        assert_eq!(token.actual_byte_count(), 400);
    }

    #[tokio::test]
    async fn grants_are_capped_by_the_free_budget() {
        let tracker = MemoryTracker::with_factor(1000, 2);
        let _first = tracker
            .register_allocation(700, 700, &CancellationToken::new())
            .await
            .unwrap();

        let second = tracker
            .register_allocation(100, 1000, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(second.actual_byte_count(), 200);
    }

    #[tokio::test]
    async fn minimum_beyond_total_fails_with_out_of_memory() {
        let tracker = MemoryTracker::new(100);

        let result = tracker
            .register_allocation(200, 300, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(NexusError::OutOfMemory(_))));
    }

    #[tokio::test]
    async fn release_wakes_the_oldest_fitting_waiter() {
        let tracker = MemoryTracker::with_factor(100, 2);

        let first = tracker
            .register_allocation(70, 70, &CancellationToken::new())
            .await
            .unwrap();
        let second = tracker
            .register_allocation(30, 30, &CancellationToken::new())
            .await
            .unwrap();

        // Saturated: 80 cannot fit, 20 fits only after a release.
        let tracker_a = tracker.clone();
        let waiter_a = tokio::spawn(async move {
            tracker_a
                .register_allocation(80, 80, &CancellationToken::new())
                .await
        });

        tokio::task::yield_now().await;

        let tracker_b = tracker.clone();
        let waiter_b = tokio::spawn(async move {
            tracker_b
                .register_allocation(20, 20, &CancellationToken::new())
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Releasing 30 bytes fits only the younger waiter (20), so it is
        // granted although an older waiter exists.
        drop(second);
        let token_b = waiter_b.await.unwrap().unwrap();
        assert_eq!(token_b.actual_byte_count(), 20);

        // Releasing the rest grants the oldest waiter.
        drop(first);
        let token_a = waiter_a.await.unwrap().unwrap();
        assert_eq!(token_a.actual_byte_count(), 80);

        drop(token_a);
        drop(token_b);
        assert_eq!(tracker.free_byte_count(), 100);
    }

    #[tokio::test]
    async fn cancelled_waiters_do_not_leak_budget() {
        let tracker = MemoryTracker::with_factor(100, 2);

        let token = tracker
            .register_allocation(100, 100, &CancellationToken::new())
            .await
            .unwrap();

        let cancellation_token = CancellationToken::new();
        let tracker_clone = tracker.clone();
        let cancellation_clone = cancellation_token.clone();

        let waiter = tokio::spawn(async move {
            tracker_clone
                .register_allocation(50, 50, &cancellation_clone)
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancellation_token.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(NexusError::Cancelled)));

        drop(token);
        assert_eq!(tracker.free_byte_count(), 100);
    }
}
