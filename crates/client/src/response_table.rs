// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent key-to-handler map with timed blocking lookups.
//!
//! One mutex guards both the map and the waiter queue. A `put` wakes
//! every queued waiter, in arrival order, regardless of which key each
//! one wants; each woken `get` re-checks the map for its own key and
//! goes back to sleep if the update was for someone else. This is
//! O(waiters) per `put` and wakes unrelated waiters spuriously, which
//! is kept deliberately: waiter counts are bounded by concurrently
//! blocked callers, and per-key signaling would change observable wake
//! timing.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

/// A queued blocking lookup: FIFO position plus a one-shot wake signal.
struct Waiter {
    id: u64,
    wake: oneshot::Sender<()>,
}

struct Inner<H> {
    handlers: HashMap<String, H>,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

/// Correlation table mapping keys to caller-owned handler values.
///
/// The table never invokes or mutates handlers; it stores clones and
/// hands them back. Handlers therefore need to be cheap to clone
/// (an `Arc` around the real state is the usual shape).
pub struct ResponseTable<H> {
    inner: Mutex<Inner<H>>,
}

impl<H> ResponseTable<H> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                handlers: HashMap::new(),
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().handlers.is_empty()
    }

    /// Number of lookups currently blocked waiting for a `put`.
    pub fn waiter_count(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Insert or overwrite the handler for `key`, then wake every
    /// queued waiter before returning.
    pub fn put(&self, key: impl Into<String>, handler: H) {
        let mut inner = self.inner.lock();
        inner.handlers.insert(key.into(), handler);
        // The queue does not track which key each waiter wants, so wake
        // them all; each re-checks the map for its own key.
        let woken = inner.waiters.len();
        while let Some(waiter) = inner.waiters.pop_front() {
            let _ = waiter.wake.send(());
        }
        if woken > 0 {
            trace!(woken, "woke blocked lookups");
        }
    }

    /// Remove the handler for `key`, returning it if present.
    ///
    /// Absence is not a signal: removal wakes no waiters.
    pub fn remove(&self, key: &str) -> Option<H> {
        self.inner.lock().handlers.remove(key)
    }
}

impl<H: Clone> ResponseTable<H> {
    /// Look up `key`, waiting up to `timeout` for it to appear.
    ///
    /// Returns `None` only when the key was absent for the whole
    /// window. A `put` that races the deadline is never dropped: the
    /// expiring waiter checks its wake signal under the lock before
    /// giving up, and loops for one more map check if the signal fired.
    pub async fn get(&self, key: &str, timeout: Duration) -> Option<H> {
        let deadline = Instant::now() + timeout;
        loop {
            let (id, mut wake) = {
                let mut inner = self.inner.lock();
                if let Some(handler) = inner.handlers.get(key) {
                    return Some(handler.clone());
                }
                if Instant::now() >= deadline {
                    return None;
                }
                let (tx, rx) = oneshot::channel();
                let id = inner.next_waiter_id;
                inner.next_waiter_id += 1;
                inner.waiters.push_back(Waiter { id, wake: tx });
                (id, rx)
            };

            match tokio::time::timeout_at(deadline, &mut wake).await {
                // Woken by some put; it may have been for another key,
                // so loop and re-check the map.
                Ok(_) => continue,
                Err(_) => {
                    let mut inner = self.inner.lock();
                    // A put may have signalled us concurrently with the
                    // deadline. Treat that as a wake rather than losing
                    // a real update.
                    if wake.try_recv().is_ok() {
                        continue;
                    }
                    inner.waiters.retain(|waiter| waiter.id != id);
                    return None;
                }
            }
        }
    }
}

impl<H> Default for ResponseTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "response_table_tests.rs"]
mod tests;
