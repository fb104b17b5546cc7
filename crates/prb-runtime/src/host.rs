#![forbid(unsafe_code)]

//! Host seams: the tree the engine annotates and the renderer that draws.
//!
//! The engine never owns host nodes. It addresses them through [`NodeId`]
//! handles, learns about changes through typed subscriptions, and writes
//! only through [`Renderer`].
//!
//! # Subscriptions
//!
//! [`HostTree::watch_children`] and [`HostTree::watch_subtree`] return a
//! [`WatchGuard`]. The subscription lives exactly as long as the guard:
//! dropping it (or calling [`WatchGuard::dispose`]) detaches the callback
//! without any further cooperation from the host.
//!
//! # Re-entrancy
//!
//! Callbacks may be invoked synchronously from inside host mutations. The
//! engine's callbacks therefore never hold engine borrows across the call
//! and defer all async work to spawned tasks.

use std::fmt;
use std::rc::Rc;

use prb_core::{PageContext, SlotContent};

/// Opaque handle to a host-owned node.
///
/// Holding a `NodeId` does not keep the node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// How the engine treats a node that shows up in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Row,
    Header,
    Other,
}

/// Membership change observed under a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    Added(NodeId),
    Removed(NodeId),
}

/// Category of an in-place change inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// In-place change somewhere inside a watched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMutation {
    pub row: NodeId,
    pub target: NodeId,
    pub kind: MutationKind,
}

pub type ChildCallback = Rc<dyn Fn(ChildEvent)>;
pub type MutationCallback = Rc<dyn Fn(RowMutation)>;

/// RAII handle for a host subscription.
///
/// Runs its disposer exactly once, on [`dispose`](Self::dispose) or drop.
#[must_use = "dropping a WatchGuard ends the subscription"]
pub struct WatchGuard {
    disposer: Option<Box<dyn FnOnce()>>,
}

impl WatchGuard {
    pub fn new(disposer: impl FnOnce() + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// A guard with nothing to release.
    pub fn inert() -> Self {
        Self { disposer: None }
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("live", &self.disposer.is_some())
            .finish()
    }
}

/// Read and subscribe access to the host document.
///
/// Discovery methods take the [`PageContext`] so one host implementation can
/// serve both page modes.
pub trait HostTree {
    /// Every row container on the page, in document order.
    fn containers(&self, page: &PageContext) -> Vec<NodeId>;

    /// Rows currently under `root` (a container or any node below one), in
    /// document order.
    fn row_nodes(&self, root: NodeId, page: &PageContext) -> Vec<NodeId>;

    /// The container's header row, if rendered.
    fn header_row(&self, container: NodeId, page: &PageContext) -> Option<NodeId>;

    fn node_kind(&self, node: NodeId, page: &PageContext) -> NodeKind;

    /// Whether `node` is still attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    /// The row's title link target.
    fn row_link(&self, row: NodeId, page: &PageContext) -> Option<String>;

    /// Text of the row's status marker ("OPEN", "MERGED", ...).
    fn status_marker(&self, row: NodeId, page: &PageContext) -> Option<String>;

    /// Observe insertions and removals under `container`. With `recursive`
    /// set, nodes added anywhere below the container are reported too.
    fn watch_children(
        &self,
        container: NodeId,
        recursive: bool,
        callback: ChildCallback,
    ) -> WatchGuard;

    /// Observe any structural, attribute, or text change inside `row`.
    fn watch_subtree(&self, row: NodeId, callback: MutationCallback) -> WatchGuard;
}

/// Write access to annotation slots and header cells.
pub trait Renderer {
    fn has_slot(&self, row: NodeId) -> bool;

    /// Create the row's slot. Only called when [`has_slot`](Self::has_slot)
    /// is false.
    fn create_slot(&self, row: NodeId);

    fn render(&self, row: NodeId, content: &SlotContent);

    /// Append the annotation column's header cell.
    fn insert_header_cell(&self, header: NodeId, label: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn guard_disposes_once_on_drop() {
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        {
            let _guard = WatchGuard::new(move || calls_clone.set(calls_clone.get() + 1));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn explicit_dispose_does_not_run_twice() {
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let guard = WatchGuard::new(move || calls_clone.set(calls_clone.get() + 1));
        guard.dispose();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn inert_guard_is_harmless() {
        let guard = WatchGuard::inert();
        assert_eq!(format!("{guard:?}"), "WatchGuard { live: false }");
    }
}
