#![forbid(unsafe_code)]

//! Trailing-edge call coalescing.
//!
//! # Design
//!
//! A [`Debouncer`] owns a target function and at most one pending timer task.
//! Each [`call`](Debouncer::call) aborts the pending task (if it has not
//! fired yet) and spawns a fresh one that sleeps for the configured delay and
//! then invokes the target with the latest arguments.
//!
//! # Invariants
//!
//! 1. At most one call is pending at any time.
//! 2. A superseded call is discarded entirely; its arguments are never
//!    delivered.
//! 3. The target runs only after `delay` without a newer call.
//! 4. Dropping the debouncer cancels its pending call.
//!
//! # Scope
//!
//! Only scheduling is cancelled. Whatever the target starts (for example a
//! spawned fetch) is not affected by later calls.
//!
//! Timer tasks are spawned with [`tokio::task::spawn_local`], so `call` must
//! run inside a [`tokio::task::LocalSet`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Coalesces bursts of calls into one trailing call.
pub struct Debouncer<A> {
    delay: Duration,
    target: Rc<dyn Fn(A)>,
    pending: RefCell<Option<JoinHandle<()>>>,
}

impl<A: 'static> Debouncer<A> {
    pub fn new(delay: Duration, target: impl Fn(A) + 'static) -> Self {
        Self {
            delay,
            target: Rc::new(target),
            pending: RefCell::new(None),
        }
    }

    /// Schedule `target(args)` after the quiet period, replacing any pending
    /// call.
    pub fn call(&self, args: A) {
        let target = Rc::clone(&self.target);
        let delay = self.delay;
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            target(args);
        });
        if let Some(previous) = self.pending.replace(Some(handle)) {
            previous.abort();
        }
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Whether a call is scheduled and has not fired yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}

impl<A> fmt::Debug for Debouncer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.borrow().is_some())
            .finish()
    }
}
