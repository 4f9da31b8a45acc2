//! The sandbox pool (spec §4.B). Hands out `n` idle handles atomically so
//! two-sandbox acquisitions (the custom-judge runner) can never deadlock
//! against each other by each holding one sandbox while waiting for a
//! second (spec §5).

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::sync::Notify;

use crate::handle::Sandbox;

struct Inner {
    idle: VecDeque<Sandbox>,
    /// FIFO order of outstanding `acquire` calls, by ticket number.
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

/// A fixed-size set of pre-initialised sandboxes.
pub struct SandboxPool {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl SandboxPool {
    pub fn new(sandboxes: Vec<Sandbox>) -> Self {
        let capacity = sandboxes.len();
        Self {
            inner: Mutex::new(Inner {
                idle: sandboxes.into_iter().collect(),
                waiters: VecDeque::new(),
                next_ticket: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }

    /// Returns exactly `n` handles, awaiting until that many are free.
    /// Waiters are served in FIFO order: a later caller asking for fewer
    /// sandboxes never jumps ahead of an earlier caller still waiting for
    /// more, which is what makes two-sandbox acquisitions deadlock-free —
    /// they are granted all-or-nothing, never half now and half later.
    pub async fn acquire(&self, n: usize) -> Vec<Sandbox> {
        debug_assert!(n <= self.capacity, "request exceeds pool capacity");
        let ticket = {
            let mut guard = self.inner.lock().await;
            let ticket = guard.next_ticket;
            guard.next_ticket += 1;
            guard.waiters.push_back(ticket);
            ticket
        };
        loop {
            // Register interest before checking, so a notify_waiters() that
            // lands between the check and the await is not lost.
            let notified = self.notify.notified();
            {
                let mut guard = self.inner.lock().await;
                if guard.waiters.front() == Some(&ticket) && guard.idle.len() >= n {
                    guard.waiters.pop_front();
                    let handles = guard.idle.drain(..n).collect::<Vec<_>>();
                    drop(guard);
                    // Wake the rest of the queue in case enough sandboxes
                    // remain for the next waiter too.
                    self.notify.notify_waiters();
                    tracing::debug!(n, "sandbox pool: acquired");
                    return handles;
                }
            }
            notified.await;
        }
    }

    /// Returns handles to the pool. Always call this, including on the
    /// error path of whatever used the handles — a leaked handle shrinks
    /// the pool's effective capacity for the rest of the process lifetime.
    pub async fn release(&self, sandboxes: Vec<Sandbox>) {
        let n = sandboxes.len();
        let mut guard = self.inner.lock().await;
        guard.idle.extend(sandboxes);
        drop(guard);
        tracing::debug!(n, "sandbox pool: released");
        self.notify.notify_waiters();
    }
}
