#![forbid(unsafe_code)]

//! Last rendered blocker count per row.
//!
//! The cache exists to keep renders idempotent: a fetch that reports the
//! count already on screen must not touch the slot. It also remembers which
//! fetch ticket produced the cached value so that a slow, older fetch cannot
//! overwrite the result of a newer one that finished first.
//!
//! A row with no entry is "absent", which differs from every real count, so
//! the first successful fetch always renders exactly once.

use std::collections::HashMap;

use prb_core::RowKey;

/// What to do with a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// The count differs from what is shown; render it.
    Render,
    /// Same count as shown; leave the slot alone.
    Unchanged,
    /// A newer fetch was already applied; drop this result.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedStatus {
    count: usize,
    ticket: u64,
}

#[derive(Debug, Default)]
pub struct StatusCache {
    entries: HashMap<RowKey, CachedStatus>,
}

impl StatusCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of fetch `ticket` for `key` and decide whether it
    /// must be rendered.
    pub fn apply(&mut self, key: &RowKey, ticket: u64, count: usize) -> CacheDecision {
        match self.entries.get_mut(key) {
            Some(cached) if ticket < cached.ticket => CacheDecision::Stale,
            Some(cached) if cached.count == count => {
                cached.ticket = ticket;
                CacheDecision::Unchanged
            }
            Some(cached) => {
                *cached = CachedStatus { count, ticket };
                CacheDecision::Render
            }
            None => {
                self.entries
                    .insert(key.clone(), CachedStatus { count, ticket });
                CacheDecision::Render
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &RowKey) -> Option<usize> {
        self.entries.get(key).map(|cached| cached.count)
    }

    pub fn remove(&mut self, key: &RowKey) -> Option<usize> {
        self.entries.remove(key).map(|cached| cached.count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
