#![forbid(unsafe_code)]

//! Subscriptions that turn host changes into resyncs.
//!
//! Two kinds of watcher exist:
//!
//! - one **container watcher** per container, which routes inserted header
//!   rows to header augmentation, inserted rows to a first sync, removed
//!   headers out of the augmented set, and (on pages that track removals)
//!   removed rows to unregistration;
//! - one **row watcher** per open Dashboard row, which feeds every in-place
//!   change through the row's own [`Debouncer`] into a later resync.
//!
//! Callbacks hold only a `Weak` reference to the engine. Once the engine is
//! gone they do nothing.

use std::rc::Rc;

use crate::debounce::Debouncer;
use crate::host::{
    ChildCallback, ChildEvent, MutationCallback, NodeId, NodeKind, RowMutation, WatchGuard,
};
use crate::registry::WatcherHandle;
use crate::sync::{SyncEngine, SyncTrigger};

/// Subscribe to every container in `containers`.
pub fn watch_containers(engine: &SyncEngine, containers: &[NodeId]) -> Vec<WatchGuard> {
    let recursive = engine.page().watch_recursively();
    containers
        .iter()
        .map(|&container| {
            let weak = engine.weak();
            let callback: ChildCallback = Rc::new(move |event: ChildEvent| {
                if let Some(engine) = weak.upgrade() {
                    on_child_event(&engine, event);
                }
            });
            tracing::debug!(message = "watch.container", container = %container, recursive);
            engine.host().watch_children(container, recursive, callback)
        })
        .collect()
}

fn on_child_event(engine: &SyncEngine, event: ChildEvent) {
    let page = engine.page();
    match event {
        ChildEvent::Added(node) => match engine.host().node_kind(node, &page) {
            NodeKind::Header => {
                engine.augment_header(node);
            }
            NodeKind::Row => engine.spawn_row_sync(node, SyncTrigger::Inserted),
            // A whole group (for example a table body) may arrive at once.
            NodeKind::Other => {
                for row in engine.host().row_nodes(node, &page) {
                    engine.spawn_row_sync(row, SyncTrigger::Inserted);
                }
            }
        },
        ChildEvent::Removed(node) => {
            if engine.forget_header(node) {
                return;
            }
            if page.tracks_removals() {
                engine.unregister(node);
            }
        }
    }
}

/// Start watching `row` for in-place changes.
pub fn watch_row(engine: &SyncEngine, row: NodeId) -> WatcherHandle {
    let weak = engine.weak();
    let debouncer = Rc::new(Debouncer::new(
        engine.config().debounce_delay,
        move |row: NodeId| {
            if let Some(engine) = weak.upgrade() {
                engine.spawn_row_sync(row, SyncTrigger::Mutated);
            }
        },
    ));
    let sink = Rc::downgrade(&debouncer);
    let callback: MutationCallback = Rc::new(move |mutation: RowMutation| {
        if let Some(debouncer) = sink.upgrade() {
            tracing::trace!(message = "row.mutation", row = %mutation.row, kind = ?mutation.kind);
            debouncer.call(mutation.row);
        }
    });
    let guard = engine.host().watch_subtree(row, callback);
    tracing::debug!(message = "watch.row", row = %row);
    WatcherHandle::new(guard, debouncer)
}
