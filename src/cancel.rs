// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cooperative cancellation.  Workers poll the token; nothing is ever
//! interrupted from the outside.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crossbeam::utils::CachePadded;

struct Inner {
    // Polled on every sample by every worker; keep it off the lines
    // the lock and condvar live on.
    cancelled: CachePadded<AtomicBool>,
    lock: Mutex<()>,
    wake: Condvar,
}

/// A shared, one-shot cancellation signal.  Clones share the signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> CancelToken {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: CachePadded::new(AtomicBool::new(false)),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Raises the signal and wakes every sleeper.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wake.notify_all();
    }

    /// Whether `cancel` has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Sleeps for up to `duration`, returning early if the token is
    /// cancelled.  Returns whether it was.
    pub fn sleep(&self, duration: Duration) -> bool {
        if duration == Duration::from_millis(0) || self.is_cancelled() {
            return self.is_cancelled();
        }
        let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .inner
            .wake
            .wait_timeout_while(guard, duration, |_| !self.inner.cancelled.load(Ordering::SeqCst))
            .unwrap_or_else(PoisonError::into_inner);
        self.is_cancelled()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
