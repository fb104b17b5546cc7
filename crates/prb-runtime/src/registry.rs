#![forbid(unsafe_code)]

//! Which rows the engine knows about, and what each one owns.
//!
//! Entries are keyed by [`RowKey`] (the row's link) with a reverse index by
//! [`NodeId`] so removal events, which only carry the node, can find their
//! entry. Nodes are stored as plain handles; the registry never keeps host
//! storage alive.
//!
//! # Invariants
//!
//! 1. A key maps to at most one entry, and a node to at most one key.
//! 2. An entry holds at most one [`WatcherHandle`]; replacing or removing the
//!    entry disposes it.
//! 3. Tickets issued for a key increase strictly, across re-registrations.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use prb_core::RowKey;

use crate::debounce::Debouncer;
use crate::host::{NodeId, WatchGuard};

/// A row's live subtree subscription together with its own debouncer.
///
/// Dropping the handle ends the subscription and cancels any pending
/// debounced resync.
pub struct WatcherHandle {
    guard: WatchGuard,
    debouncer: Rc<Debouncer<NodeId>>,
}

impl WatcherHandle {
    pub fn new(guard: WatchGuard, debouncer: Rc<Debouncer<NodeId>>) -> Self {
        Self { guard, debouncer }
    }

    /// End the subscription and cancel any pending resync.
    pub fn dispose(self) {
        drop(self);
    }

    #[must_use]
    pub fn has_pending_resync(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.debouncer.cancel();
    }
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("guard", &self.guard)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

/// Outcome of [`RowRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First time this key is seen.
    New,
    /// Same key, same node: the host re-delivered an existing row.
    AlreadyPresent,
    /// Same key, different node: the host recreated the row. The previous
    /// node's watcher has been disposed. `evicted` is set when the new node
    /// was itself registered under another link.
    Replaced {
        previous: NodeId,
        evicted: Option<RowKey>,
    },
    /// New key on a node that was registered under `evicted`: the host reused
    /// the node for another link. The node's watcher moves to the new entry.
    Rebound { evicted: RowKey },
}

impl Registration {
    /// Key whose entry this registration dropped, if any.
    #[must_use]
    pub fn evicted(&self) -> Option<&RowKey> {
        match self {
            Self::Replaced { evicted, .. } => evicted.as_ref(),
            Self::Rebound { evicted } => Some(evicted),
            Self::New | Self::AlreadyPresent => None,
        }
    }
}

#[derive(Debug)]
struct RowEntry {
    node: NodeId,
    merged: bool,
    watcher: Option<WatcherHandle>,
}

/// Known rows and their per-row resources.
#[derive(Debug, Default)]
pub struct RowRegistry {
    by_key: HashMap<RowKey, RowEntry>,
    by_node: HashMap<NodeId, RowKey>,
    /// Last ticket handed out per key. Survives unregistration so a row that
    /// comes back never reuses a ticket.
    tickets: HashMap<RowKey, u64>,
}

impl RowRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: RowKey, node: NodeId) -> Registration {
        if self.is_current(&key, node) {
            return Registration::AlreadyPresent;
        }
        // The node may carry a different link than before (host reused it).
        let (evicted, carried) = match self.by_node.remove(&node) {
            Some(stale_key) => {
                let watcher = self
                    .by_key
                    .remove(&stale_key)
                    .and_then(|entry| entry.watcher);
                (Some(stale_key), watcher)
            }
            None => (None, None),
        };
        self.by_node.insert(node, key.clone());

        if let Some(entry) = self.by_key.get_mut(&key) {
            let previous = entry.node;
            entry.node = node;
            entry.merged = false;
            if let Some(watcher) = std::mem::replace(&mut entry.watcher, carried) {
                watcher.dispose();
            }
            self.by_node.remove(&previous);
            return Registration::Replaced { previous, evicted };
        }

        self.by_key.insert(
            key,
            RowEntry {
                node,
                merged: false,
                watcher: carried,
            },
        );
        match evicted {
            Some(evicted) => Registration::Rebound { evicted },
            None => Registration::New,
        }
    }

    /// Forget `node`, disposing its watcher. Unknown nodes are a no-op.
    pub fn unregister(&mut self, node: NodeId) -> Option<RowKey> {
        let key = self.by_node.remove(&node)?;
        if let Some(entry) = self.by_key.remove(&key)
            && let Some(watcher) = entry.watcher
        {
            watcher.dispose();
        }
        Some(key)
    }

    /// Attach `watcher` to the row unless it already has one. Returns false
    /// (and drops `watcher`) when the row is unknown, merged, or watched.
    pub fn attach_watcher(&mut self, key: &RowKey, node: NodeId, watcher: WatcherHandle) -> bool {
        match self.by_key.get_mut(key) {
            Some(entry) if entry.node == node && !entry.merged && entry.watcher.is_none() => {
                entry.watcher = Some(watcher);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn has_watcher(&self, key: &RowKey) -> bool {
        self.by_key
            .get(key)
            .is_some_and(|entry| entry.watcher.is_some())
    }

    /// Detach the row's watcher without disposing it, so the caller can drop
    /// it outside any borrow of the registry.
    pub fn take_watcher(&mut self, key: &RowKey) -> Option<WatcherHandle> {
        self.by_key.get_mut(key)?.watcher.take()
    }

    /// Mark the row terminal and dispose its watcher.
    pub fn mark_merged(&mut self, key: &RowKey) {
        if let Some(entry) = self.by_key.get_mut(key) {
            entry.merged = true;
            if let Some(watcher) = entry.watcher.take() {
                watcher.dispose();
            }
        }
    }

    #[must_use]
    pub fn is_merged(&self, key: &RowKey) -> bool {
        self.by_key.get(key).is_some_and(|entry| entry.merged)
    }

    /// Next fetch ticket for `key`.
    pub fn issue_ticket(&mut self, key: &RowKey) -> u64 {
        let ticket = self.tickets.entry(key.clone()).or_insert(0);
        *ticket += 1;
        *ticket
    }

    /// Whether `node` is still the registered node for `key`.
    #[must_use]
    pub fn is_current(&self, key: &RowKey, node: NodeId) -> bool {
        self.by_key.get(key).is_some_and(|entry| entry.node == node)
    }

    #[must_use]
    pub fn key_of(&self, node: NodeId) -> Option<&RowKey> {
        self.by_node.get(&node)
    }

    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Number of rows holding a live watcher.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.by_key
            .values()
            .filter(|entry| entry.watcher.is_some())
            .count()
    }

    /// Forget every row, disposing all watchers.
    pub fn clear(&mut self) {
        for (_, entry) in self.by_key.drain() {
            if let Some(watcher) = entry.watcher {
                watcher.dispose();
            }
        }
        self.by_node.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn key(id: u32) -> RowKey {
        RowKey::new(format!("/projects/P/repos/r/pull-requests/{id}/overview"))
    }

    fn counting_watcher(disposed: &Rc<Cell<u32>>) -> WatcherHandle {
        let disposed = Rc::clone(disposed);
        WatcherHandle::new(
            WatchGuard::new(move || disposed.set(disposed.get() + 1)),
            Rc::new(Debouncer::new(Duration::from_millis(10), |_node: NodeId| {})),
        )
    }

    #[test]
    fn register_twice_is_already_present() {
        let mut registry = RowRegistry::new();
        assert_eq!(registry.register(key(1), NodeId::new(1)), Registration::New);
        assert_eq!(
            registry.register(key(1), NodeId::new(1)),
            Registration::AlreadyPresent
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_watcher_is_refused() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        assert!(registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed)));
        assert!(!registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed)));
        assert_eq!(registry.watcher_count(), 1);
        // The refused handle was dropped, which released its guard.
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn unregister_disposes_watcher() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed));
        assert_eq!(registry.unregister(NodeId::new(1)), Some(key(1)));
        assert_eq!(disposed.get(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.unregister(NodeId::new(1)), None);
    }

    #[test]
    fn unregister_without_watcher_is_safe() {
        let mut registry = RowRegistry::new();
        registry.register(key(2), NodeId::new(2));
        registry.mark_merged(&key(2));
        assert_eq!(registry.unregister(NodeId::new(2)), Some(key(2)));
    }

    #[test]
    fn recreated_node_replaces_entry_and_drops_old_watcher() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed));
        assert_eq!(
            registry.register(key(1), NodeId::new(9)),
            Registration::Replaced {
                previous: NodeId::new(1),
                evicted: None,
            }
        );
        assert_eq!(disposed.get(), 1);
        assert!(registry.is_current(&key(1), NodeId::new(9)));
        // The late removal of the old node must not touch the new entry.
        assert_eq!(registry.unregister(NodeId::new(1)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reused_node_evicts_old_link_and_keeps_its_watcher() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed));

        let registration = registry.register(key(2), NodeId::new(1));
        assert_eq!(registration, Registration::Rebound { evicted: key(1) });
        assert_eq!(registration.evicted(), Some(&key(1)));
        assert_eq!(disposed.get(), 0);
        assert!(registry.has_watcher(&key(2)));
        assert!(!registry.is_current(&key(1), NodeId::new(1)));
        assert_eq!(registry.key_of(NodeId::new(1)), Some(&key(2)));
        assert_eq!(registry.len(), 1);

        // The old link coming back on a fresh node is a plain first sighting.
        assert_eq!(registry.register(key(1), NodeId::new(3)), Registration::New);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn recreated_row_on_a_reused_node_reports_both_sides() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        registry.register(key(2), NodeId::new(2));
        registry.attach_watcher(&key(1), NodeId::new(1), counting_watcher(&disposed));

        assert_eq!(
            registry.register(key(1), NodeId::new(2)),
            Registration::Replaced {
                previous: NodeId::new(1),
                evicted: Some(key(2)),
            }
        );
        assert_eq!(disposed.get(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains_node(NodeId::new(1)));
        assert_eq!(registry.key_of(NodeId::new(2)), Some(&key(1)));
    }

    #[test]
    fn merged_rows_refuse_watchers() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(3), NodeId::new(3));
        registry.mark_merged(&key(3));
        assert!(registry.is_merged(&key(3)));
        assert!(!registry.attach_watcher(&key(3), NodeId::new(3), counting_watcher(&disposed)));
        assert!(!registry.has_watcher(&key(3)));
    }

    #[test]
    fn take_watcher_leaves_entry_unwatched() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        registry.register(key(4), NodeId::new(4));
        registry.attach_watcher(&key(4), NodeId::new(4), counting_watcher(&disposed));
        let handle = registry.take_watcher(&key(4));
        assert!(handle.is_some());
        assert!(!registry.has_watcher(&key(4)));
        assert_eq!(disposed.get(), 0);
        drop(handle);
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn tickets_keep_increasing_across_reregistration() {
        let mut registry = RowRegistry::new();
        registry.register(key(1), NodeId::new(1));
        assert_eq!(registry.issue_ticket(&key(1)), 1);
        assert_eq!(registry.issue_ticket(&key(1)), 2);
        registry.unregister(NodeId::new(1));
        registry.register(key(1), NodeId::new(5));
        assert_eq!(registry.issue_ticket(&key(1)), 3);
    }

    #[test]
    fn clear_disposes_everything() {
        let disposed = Rc::new(Cell::new(0));
        let mut registry = RowRegistry::new();
        for id in 1..=3 {
            registry.register(key(id), NodeId::new(u64::from(id)));
            registry.attach_watcher(&key(id), NodeId::new(u64::from(id)), counting_watcher(&disposed));
        }
        registry.clear();
        assert_eq!(disposed.get(), 3);
        assert!(registry.is_empty());
        assert!(!registry.contains_node(NodeId::new(1)));
    }
}
