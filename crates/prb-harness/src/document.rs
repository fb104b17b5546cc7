#![forbid(unsafe_code)]

//! In-memory stand-in for the pull-request pages.
//!
//! [`SimDocument`] models just enough of the host page for the engine:
//! containers tagged with a section name, optional groups (table bodies),
//! header rows, and rows carrying a link, a status marker, and an
//! annotation slot. It implements both [`HostTree`] and [`Renderer`].
//!
//! # Events
//!
//! Structural edits report [`ChildEvent`]s to watchers of the parent
//! (direct subscriptions) and of every ancestor (recursive subscriptions),
//! in that order. Marker, link, and touch edits report a [`RowMutation`] to
//! the row's subtree watchers. Renderer writes are not reported.
//!
//! Removed nodes stay queryable but are no longer connected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use prb_core::{PageContext, SlotContent};
use prb_runtime::{
    ChildCallback, ChildEvent, HostTree, MutationCallback, MutationKind, NodeId, NodeKind,
    Renderer, RowMutation, WatchGuard,
};

use crate::topic::Topic;

#[derive(Debug, Clone)]
enum SimKind {
    Container { section: String },
    Group,
    Header { cells: Vec<String> },
    Row(RowData),
}

#[derive(Debug, Clone, Default)]
struct RowData {
    link: Option<String>,
    marker: Option<String>,
    slot: Option<SlotContent>,
    slots_created: usize,
    renders: usize,
}

#[derive(Debug)]
struct SimNode {
    kind: SimKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    connected: bool,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: HashMap<NodeId, SimNode>,
    next_id: u64,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.get(&id)
    }

    fn row(&self, id: NodeId) -> Option<&RowData> {
        match &self.node(id)?.kind {
            SimKind::Row(row) => Some(row),
            _ => None,
        }
    }

    fn row_mut(&mut self, id: NodeId) -> Option<&mut RowData> {
        match &mut self.nodes.get_mut(&id)?.kind {
            SimKind::Row(row) => Some(row),
            _ => None,
        }
    }

    fn create(&mut self, kind: SimKind) -> NodeId {
        self.next_id += 1;
        let id = NodeId::new(self.next_id);
        self.nodes.insert(
            id,
            SimNode {
                kind,
                parent: None,
                children: Vec::new(),
                connected: false,
            },
        );
        id
    }

    fn set_connected(&mut self, root: NodeId, connected: bool) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.connected = connected;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        let parent_connected = match self.nodes.get_mut(&parent) {
            Some(node) => {
                node.children.push(child);
                node.connected
            }
            None => false,
        };
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.set_connected(child, parent_connected);
    }

    /// `node` and its ancestors, nearest first.
    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.node(node).and_then(|n| n.parent);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.node(id).and_then(|n| n.parent);
        }
        chain
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

#[derive(Debug, Default)]
struct Topics {
    direct: HashMap<NodeId, Rc<Topic<ChildEvent>>>,
    recursive: HashMap<NodeId, Rc<Topic<ChildEvent>>>,
    rows: HashMap<NodeId, Rc<Topic<RowMutation>>>,
}

/// Simulated host page.
#[derive(Debug, Default)]
pub struct SimDocument {
    tree: RefCell<Tree>,
    topics: RefCell<Topics>,
}

impl SimDocument {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    // ── Building ────────────────────────────────────────────────────────

    /// Add a top-level container for `section` (for example
    /// `"reviewing-pull-requests"`).
    pub fn add_container(&self, section: &str) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        let id = tree.create(SimKind::Container {
            section: section.to_string(),
        });
        tree.set_connected(id, true);
        id
    }

    /// Add an empty group (table body) under `parent`.
    pub fn add_group(&self, parent: NodeId) -> NodeId {
        self.insert(parent, SimKind::Group)
    }

    pub fn add_header(&self, parent: NodeId) -> NodeId {
        self.insert(parent, SimKind::Header { cells: Vec::new() })
    }

    /// Add an open row linking to `link`.
    pub fn add_row(&self, parent: NodeId, link: &str) -> NodeId {
        self.insert(parent, row_kind(Some(link), "OPEN"))
    }

    pub fn add_merged_row(&self, parent: NodeId, link: &str) -> NodeId {
        self.insert(parent, row_kind(Some(link), "MERGED"))
    }

    /// Add a row whose title link is missing.
    pub fn add_unlinked_row(&self, parent: NodeId) -> NodeId {
        self.insert(parent, row_kind(None, "OPEN"))
    }

    /// Add an open row without reporting it to any watcher.
    pub fn add_row_quietly(&self, parent: NodeId, link: &str) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        let id = tree.create(row_kind(Some(link), "OPEN"));
        tree.append(parent, id);
        id
    }

    /// Build a group holding one open row per link, then insert it with a
    /// single event for the group.
    pub fn add_populated_group(&self, parent: NodeId, links: &[&str]) -> (NodeId, Vec<NodeId>) {
        let (group, rows) = {
            let mut tree = self.tree.borrow_mut();
            let group = tree.create(SimKind::Group);
            let rows: Vec<NodeId> = links
                .iter()
                .map(|&link| {
                    let row = tree.create(row_kind(Some(link), "OPEN"));
                    tree.append(group, row);
                    row
                })
                .collect();
            tree.append(parent, group);
            (group, rows)
        };
        self.emit_child(group, ChildEvent::Added(group));
        (group, rows)
    }

    fn insert(&self, parent: NodeId, kind: SimKind) -> NodeId {
        let id = {
            let mut tree = self.tree.borrow_mut();
            let id = tree.create(kind);
            tree.append(parent, id);
            id
        };
        self.emit_child(id, ChildEvent::Added(id));
        id
    }

    // ── Editing ─────────────────────────────────────────────────────────

    /// Detach `node` (and its subtree) from its parent, or from the page for
    /// a top-level container.
    pub fn remove(&self, node: NodeId) {
        let removed = {
            let mut tree = self.tree.borrow_mut();
            let parent = tree.node(node).and_then(|n| n.parent);
            match parent {
                Some(parent) => {
                    // Watchers are notified with the pre-removal ancestry.
                    let ancestry = tree.ancestors(node);
                    if let Some(p) = tree.nodes.get_mut(&parent) {
                        p.children.retain(|&c| c != node);
                    }
                    if let Some(n) = tree.nodes.get_mut(&node) {
                        n.parent = None;
                    }
                    tree.set_connected(node, false);
                    Some(ancestry)
                }
                // A top-level container; nothing above it is watched.
                None => {
                    tree.set_connected(node, false);
                    None
                }
            }
        };
        if let Some(ancestry) = removed {
            self.notify_ancestry(&ancestry, ChildEvent::Removed(node));
        }
    }

    /// Report `node` as inserted again without changing the tree, the way a
    /// host re-renders an existing record.
    pub fn announce(&self, node: NodeId) {
        self.emit_child(node, ChildEvent::Added(node));
    }

    pub fn set_marker(&self, row: NodeId, marker: &str) {
        if let Some(data) = self.tree.borrow_mut().row_mut(row) {
            data.marker = Some(marker.to_string());
        }
        self.emit_mutation(row, MutationKind::CharacterData);
    }

    pub fn set_link(&self, row: NodeId, link: &str) {
        if let Some(data) = self.tree.borrow_mut().row_mut(row) {
            data.link = Some(link.to_string());
        }
        self.emit_mutation(row, MutationKind::Attributes);
    }

    /// Report a structural change inside `row` without altering anything the
    /// engine reads.
    pub fn touch(&self, row: NodeId) {
        self.emit_mutation(row, MutationKind::ChildList);
    }

    // ── Inspection ──────────────────────────────────────────────────────

    #[must_use]
    pub fn slot(&self, row: NodeId) -> Option<SlotContent> {
        self.tree.borrow().row(row).and_then(|r| r.slot.clone())
    }

    /// How many times the renderer wrote into the row's slot.
    #[must_use]
    pub fn render_count(&self, row: NodeId) -> usize {
        self.tree.borrow().row(row).map_or(0, |r| r.renders)
    }

    #[must_use]
    pub fn slots_created(&self, row: NodeId) -> usize {
        self.tree.borrow().row(row).map_or(0, |r| r.slots_created)
    }

    #[must_use]
    pub fn header_cells(&self, header: NodeId) -> Vec<String> {
        match self.tree.borrow().node(header).map(|n| &n.kind) {
            Some(SimKind::Header { cells }) => cells.clone(),
            _ => Vec::new(),
        }
    }

    /// Live subtree watchers on `row`.
    #[must_use]
    pub fn row_watchers(&self, row: NodeId) -> usize {
        self.topics
            .borrow()
            .rows
            .get(&row)
            .map_or(0, |topic| topic.live_count())
    }

    #[must_use]
    pub fn active_row_watchers(&self) -> usize {
        self.topics
            .borrow()
            .rows
            .values()
            .map(|topic| topic.live_count())
            .sum()
    }

    #[must_use]
    pub fn active_container_watchers(&self) -> usize {
        let topics = self.topics.borrow();
        topics
            .direct
            .values()
            .chain(topics.recursive.values())
            .map(|topic| topic.live_count())
            .sum()
    }

    // ── Event delivery ──────────────────────────────────────────────────

    fn emit_child(&self, node: NodeId, event: ChildEvent) {
        let ancestry = self.tree.borrow().ancestors(node);
        self.notify_ancestry(&ancestry, event);
    }

    fn notify_ancestry(&self, ancestry: &[NodeId], event: ChildEvent) {
        let (direct, recursive) = {
            let topics = self.topics.borrow();
            let direct = ancestry
                .first()
                .and_then(|parent| topics.direct.get(parent).cloned());
            let recursive: Vec<_> = ancestry
                .iter()
                .filter_map(|id| topics.recursive.get(id).cloned())
                .collect();
            (direct, recursive)
        };
        if let Some(topic) = direct {
            topic.notify(event);
        }
        for topic in recursive {
            topic.notify(event);
        }
    }

    fn emit_mutation(&self, row: NodeId, kind: MutationKind) {
        let topic = self.topics.borrow().rows.get(&row).cloned();
        if let Some(topic) = topic {
            topic.notify(RowMutation {
                row,
                target: row,
                kind,
            });
        }
    }
}

fn row_kind(link: Option<&str>, marker: &str) -> SimKind {
    SimKind::Row(RowData {
        link: link.map(str::to_string),
        marker: Some(marker.to_string()),
        ..RowData::default()
    })
}

impl HostTree for SimDocument {
    fn containers(&self, page: &PageContext) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        let mut found: Vec<NodeId> = tree
            .nodes
            .iter()
            .filter(|(_, node)| node.connected)
            .filter_map(|(&id, node)| match &node.kind {
                SimKind::Container { section } if page.sections().contains(&section.as_str()) => {
                    Some(id)
                }
                _ => None,
            })
            .collect();
        found.sort();
        found
    }

    fn row_nodes(&self, root: NodeId, _page: &PageContext) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        tree.descendants(root)
            .into_iter()
            .filter(|&id| tree.row(id).is_some())
            .collect()
    }

    fn header_row(&self, container: NodeId, _page: &PageContext) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.descendants(container)
            .into_iter()
            .find(|&id| matches!(tree.node(id).map(|n| &n.kind), Some(SimKind::Header { .. })))
    }

    fn node_kind(&self, node: NodeId, _page: &PageContext) -> NodeKind {
        match self.tree.borrow().node(node).map(|n| &n.kind) {
            Some(SimKind::Row(_)) => NodeKind::Row,
            Some(SimKind::Header { .. }) => NodeKind::Header,
            _ => NodeKind::Other,
        }
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().node(node).is_some_and(|n| n.connected)
    }

    fn row_link(&self, row: NodeId, _page: &PageContext) -> Option<String> {
        self.tree.borrow().row(row).and_then(|r| r.link.clone())
    }

    fn status_marker(&self, row: NodeId, _page: &PageContext) -> Option<String> {
        self.tree.borrow().row(row).and_then(|r| r.marker.clone())
    }

    fn watch_children(
        &self,
        container: NodeId,
        recursive: bool,
        callback: ChildCallback,
    ) -> WatchGuard {
        let topic = {
            let mut topics = self.topics.borrow_mut();
            let map = if recursive {
                &mut topics.recursive
            } else {
                &mut topics.direct
            };
            Rc::clone(map.entry(container).or_default())
        };
        topic.subscribe(callback)
    }

    fn watch_subtree(&self, row: NodeId, callback: MutationCallback) -> WatchGuard {
        let topic = Rc::clone(self.topics.borrow_mut().rows.entry(row).or_default());
        topic.subscribe(callback)
    }
}

impl Renderer for SimDocument {
    fn has_slot(&self, row: NodeId) -> bool {
        self.tree.borrow().row(row).is_some_and(|r| r.slots_created > 0)
    }

    fn create_slot(&self, row: NodeId) {
        if let Some(data) = self.tree.borrow_mut().row_mut(row) {
            data.slots_created += 1;
        }
    }

    fn render(&self, row: NodeId, content: &SlotContent) {
        if let Some(data) = self.tree.borrow_mut().row_mut(row) {
            data.slot = Some(content.clone());
            data.renders += 1;
        }
    }

    fn insert_header_cell(&self, header: NodeId, label: &str) {
        if let Some(SimNode {
            kind: SimKind::Header { cells },
            ..
        }) = self.tree.borrow_mut().nodes.get_mut(&header)
        {
            cells.push(label.to_string());
        }
    }
}
