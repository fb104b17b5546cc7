#![forbid(unsafe_code)]

//! Weak-callback fan-out used for every simulated subscription.
//!
//! A [`Topic`] stores subscribers as `Weak` function pointers. The strong
//! reference lives inside the [`WatchGuard`] handed back to the subscriber,
//! so dropping the guard is all it takes to unsubscribe. Dead entries are
//! pruned lazily on the next notification.
//!
//! Callbacks are collected before any of them runs, so a callback may
//! subscribe, unsubscribe, or mutate the document without tripping a borrow.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use prb_runtime::WatchGuard;

pub struct Topic<E> {
    subscribers: RefCell<Vec<Weak<dyn Fn(E)>>>,
}

impl<E> Default for Topic<E> {
    fn default() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

impl<E: Copy + 'static> Topic<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: Rc<dyn Fn(E)>) -> WatchGuard {
        self.subscribers.borrow_mut().push(Rc::downgrade(&callback));
        WatchGuard::new(move || drop(callback))
    }

    /// Deliver `event` to every live subscriber in subscription order.
    /// Returns how many were called.
    pub fn notify(&self, event: E) -> usize {
        let live = self.live();
        for callback in &live {
            callback(event);
        }
        live.len()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn live(&self) -> Vec<Rc<dyn Fn(E)>> {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|weak| weak.strong_count() > 0);
        subscribers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl<E> std::fmt::Debug for Topic<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}
