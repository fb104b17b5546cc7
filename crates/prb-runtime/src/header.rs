#![forbid(unsafe_code)]

//! Header cells for the annotation column.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::host::{HostTree, NodeId, Renderer};
use prb_core::PageContext;

/// Remembers which header rows already carry the annotation column's cell.
#[derive(Debug, Default)]
pub struct HeaderAugmenter {
    label: String,
    augmented: RefCell<HashSet<NodeId>>,
}

impl HeaderAugmenter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            augmented: RefCell::new(HashSet::new()),
        }
    }

    /// Append the cell to `header` once. Returns whether a cell was added.
    pub fn augment(&self, renderer: &dyn Renderer, header: NodeId) -> bool {
        if !self.augmented.borrow_mut().insert(header) {
            return false;
        }
        tracing::debug!(message = "header.augment", header = %header, label = %self.label);
        renderer.insert_header_cell(header, &self.label);
        true
    }

    /// Augment the header rows already rendered in `containers`.
    pub fn augment_existing(
        &self,
        host: &dyn HostTree,
        renderer: &dyn Renderer,
        page: &PageContext,
        containers: &[NodeId],
    ) -> usize {
        containers
            .iter()
            .filter_map(|&container| host.header_row(container, page))
            .filter(|&header| self.augment(renderer, header))
            .count()
    }

    /// Drop `header` from the augmented set, for example after the host
    /// removed it. Returns whether it was known.
    pub fn forget(&self, header: NodeId) -> bool {
        self.augmented.borrow_mut().remove(&header)
    }

    #[must_use]
    pub fn is_augmented(&self, header: NodeId) -> bool {
        self.augmented.borrow().contains(&header)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn clear(&self) {
        self.augmented.borrow_mut().clear();
    }
}
