// ============================================================================
// Trigger Queue
// Hand-off between submitting threads and the stop-order executor
// ============================================================================

use crate::domain::MarketOrder;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::thread;

#[derive(Debug, Default)]
struct QueueState {
    /// Market orders created by triggered stops, in trigger order
    pending: VecDeque<MarketOrder>,
    /// Batches taken off the queue whose execution has not finished yet
    in_flight: usize,
    executor_attached: bool,
    shutdown: bool,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    fn take_batch(&mut self) -> Vec<MarketOrder> {
        self.in_flight += 1;
        self.pending.drain(..).collect()
    }
}

/// Queue of triggered stops plus the condition variable both sides of the
/// rendezvous wait on.
///
/// Lock order: the book lock may be held while enqueueing, never the other
/// way round.
#[derive(Debug, Default)]
pub(crate) struct TriggerQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
}

impl TriggerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue<I>(&self, orders: I)
    where
        I: IntoIterator<Item = MarketOrder>,
    {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.extend(orders);
        if state.pending.len() > before {
            self.signal.notify_all();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.state.lock().is_drained()
    }

    // ========================================================================
    // Submitting side
    // ========================================================================

    /// Block until every queued stop, including stops they trigger in turn,
    /// has been executed.
    ///
    /// With no executor attached the caller drains the queue itself through
    /// `run_inline`, one batch at a time.
    pub(crate) fn wait_until_drained<F>(&self, mut run_inline: F)
    where
        F: FnMut(Vec<MarketOrder>),
    {
        let mut state = self.state.lock();
        loop {
            if state.is_drained() {
                return;
            }
            if state.executor_attached || state.in_flight > 0 {
                self.signal.notify_all();
                self.signal.wait(&mut state);
                continue;
            }
            let batch = state.take_batch();
            MutexGuard::unlocked(&mut state, || {
                let _unwind = UnwindRelease::inline(self);
                run_inline(batch);
            });
            self.finish(&mut state);
        }
    }

    // ========================================================================
    // Executor side
    // ========================================================================

    /// Claim the executor role. Fails if another executor holds it.
    pub(crate) fn attach_executor(&self) -> bool {
        let mut state = self.state.lock();
        if state.executor_attached {
            return false;
        }
        state.executor_attached = true;
        state.shutdown = false;
        true
    }

    pub(crate) fn detach_executor(&self) {
        let mut state = self.state.lock();
        state.executor_attached = false;
        state.shutdown = false;
        self.signal.notify_all();
    }

    /// Wait for work and take everything queued as one batch.
    ///
    /// Returns `None` once shutdown was requested and the queue is empty.
    pub(crate) fn next_batch(&self) -> Option<Vec<MarketOrder>> {
        let mut state = self.state.lock();
        while state.pending.is_empty() && !state.shutdown {
            self.signal.wait(&mut state);
        }
        if state.pending.is_empty() {
            return None;
        }
        Some(state.take_batch())
    }

    /// Mark a batch from `next_batch` as executed and wake the waiters.
    pub(crate) fn complete_batch(&self) {
        let mut state = self.state.lock();
        self.finish(&mut state);
    }

    pub(crate) fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.signal.notify_all();
    }

    fn finish(&self, state: &mut MutexGuard<'_, QueueState>) {
        state.in_flight = state
            .in_flight
            .checked_sub(1)
            .unwrap_or_else(|| panic!("trigger batch completed twice"));
        self.signal.notify_all();
    }
}

/// Finishes a taken batch if its execution unwinds, so waiters are woken
/// instead of blocking on a batch that will never complete.
///
/// On the executor thread the executor role is released as well; waiting
/// clients then drain what is left inline.
pub(crate) struct UnwindRelease<'a> {
    queue: &'a TriggerQueue,
    detach_executor: bool,
}

impl<'a> UnwindRelease<'a> {
    pub(crate) fn inline(queue: &'a TriggerQueue) -> Self {
        Self {
            queue,
            detach_executor: false,
        }
    }

    pub(crate) fn executor(queue: &'a TriggerQueue) -> Self {
        Self {
            queue,
            detach_executor: true,
        }
    }
}

impl Drop for UnwindRelease<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        self.queue.complete_batch();
        if self.detach_executor {
            self.queue.detach_executor();
        }
    }
}
