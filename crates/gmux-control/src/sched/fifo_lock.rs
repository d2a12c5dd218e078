//! Fair FIFO asynchronous lock.
//!
//! Ordering correctness of the scheduler rests on one property the stock
//! async mutexes cannot give us: a waiter's position in the queue must be
//! fixed *synchronously*, before any other task gets a chance to enqueue.
//! [`FifoLock::enqueue`] reserves the slot immediately and returns a
//! [`PendingGuard`] that is awaited later; this is how a code reserves its
//! finish slot while it still holds the start lock, pinning completion
//! order to admission order.
//!
//! Waiters that are dropped before their turn (cancellation) are skipped
//! when the lock is released.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Default)]
struct Inner {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Inner {
    /// Hands the lock to the next live waiter, or unlocks.
    fn release(&mut self) {
        loop {
            match self.waiters.pop_front() {
                // Receiver dropped its slot; skip it.
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        return;
                    }
                }
                None => {
                    self.locked = false;
                    return;
                }
            }
        }
    }
}

/// Fair FIFO async lock. Cheap to clone; clones share the queue.
#[derive(Clone, Default)]
pub struct FifoLock {
    inner: Arc<Mutex<Inner>>,
}

enum PendState {
    /// Acquired at enqueue time (the lock was free).
    Ready,
    /// Queued; the sender fires when it is our turn.
    Waiting(oneshot::Receiver<()>),
    /// Converted into a guard or dropped.
    Consumed,
}

/// A reserved queue slot, not yet (necessarily) held.
pub struct PendingGuard {
    lock: FifoLock,
    state: PendState,
}

/// The held lock. Releasing wakes the next live waiter.
pub struct FifoGuard {
    lock: FifoLock,
}

impl FifoLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next queue slot synchronously.
    pub fn enqueue(&self) -> PendingGuard {
        let mut inner = self.inner.lock();
        let state = if inner.locked {
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            PendState::Waiting(rx)
        } else {
            inner.locked = true;
            PendState::Ready
        };
        PendingGuard {
            lock: self.clone(),
            state,
        }
    }

    /// Enqueues and waits in one step.
    pub async fn acquire(&self) -> FifoGuard {
        self.enqueue().wait().await
    }

    /// `true` while some guard holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }
}

impl PendingGuard {
    /// Waits for the reserved slot to come up.
    pub async fn wait(mut self) -> FifoGuard {
        let state = std::mem::replace(&mut self.state, PendState::Consumed);
        if let PendState::Waiting(rx) = state {
            // The sender is only ever dropped after firing or when the
            // slot is skipped on release; both leave us the holder.
            let _ = rx.await;
        }
        FifoGuard {
            lock: self.lock.clone(),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, PendState::Consumed) {
            PendState::Ready => self.lock.inner.lock().release(),
            PendState::Waiting(mut rx) => {
                // Decide under the queue mutex whether the token already
                // reached us; otherwise closing the receiver makes release
                // skip our slot.
                let mut inner = self.lock.inner.lock();
                if rx.try_recv().is_ok() {
                    inner.release();
                }
            }
            PendState::Consumed => {}
        }
    }
}

impl Drop for FifoGuard {
    fn drop(&mut self) {
        self.lock.inner.lock().release();
    }
}
