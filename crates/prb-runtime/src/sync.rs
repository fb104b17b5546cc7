#![forbid(unsafe_code)]

//! Row resynchronization.
//!
//! [`SyncEngine`] owns the registry, the status cache, and the diagnostics
//! counters, and runs the per-row pipeline:
//!
//! ```text
//! register ─► merged? ─► parse link ─► fetch ─► still current? ─► cache ─► render
//! ```
//!
//! # Invariants
//!
//! 1. No `RefCell` borrow is held across an `.await` or across a call into the
//!    host tree or renderer.
//! 2. A row known to be merged is never queried or fetched again.
//! 3. A fetch result is applied only if its row is still registered with the
//!    same node and no newer result has been applied.
//!
//! # Failure Modes
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Fetch error | One `row.fetch_failed` event per cause, annotation untouched |
//! | Missing or unrecognized link | `row.markup_defect` at error level, counted as a defect |
//! | Row removed mid-fetch | Result dropped ([`SyncOutcome::Detached`]) |
//! | Older fetch finishes last | Result dropped ([`SyncOutcome::Stale`]) |

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use prb_core::{
    Annotation, EngineConfig, PageContext, PullRequestRef, RowKey, RowState, SlotContent,
    SyncError,
};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::context::EngineContext;
use crate::header::HeaderAugmenter;
use crate::host::{HostTree, NodeId, Renderer, WatchGuard};
use crate::registry::{Registration, RowRegistry};
use crate::status_cache::{CacheDecision, StatusCache};
use crate::watcher;

/// Why a row is being resynced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTrigger {
    /// The row was just inserted, or found by the startup pass.
    Inserted,
    /// The row's own watcher saw it change.
    Mutated,
    /// A periodic pass re-enumerated it.
    Refresh,
}

impl SyncTrigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Mutated => "mutated",
            Self::Refresh => "refresh",
        }
    }
}

/// How a successful resync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First-sync delivery for a row that was already registered.
    AlreadyTracked,
    /// Row is merged; nothing was fetched.
    Merged,
    /// The slot now shows `count`.
    Rendered { count: usize },
    /// Fetched count equals what is shown.
    Unchanged,
    /// A newer result was already applied.
    Stale,
    /// The row was removed or recreated before the result arrived.
    Detached,
}

/// Engine-lifetime counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    fetches_issued: Cell<u64>,
    renders: Cell<u64>,
    unchanged_skips: Cell<u64>,
    stale_discards: Cell<u64>,
    fetch_failures: Cell<u64>,
    link_defects: Cell<u64>,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub fetches_issued: u64,
    pub renders: u64,
    pub unchanged_skips: u64,
    pub stale_discards: u64,
    pub fetch_failures: u64,
    pub link_defects: u64,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get().saturating_add(1));
}

impl EngineStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetches_issued: self.fetches_issued.get(),
            renders: self.renders.get(),
            unchanged_skips: self.unchanged_skips.get(),
            stale_discards: self.stale_discards.get(),
            fetch_failures: self.fetch_failures.get(),
            link_defects: self.link_defects.get(),
        }
    }
}

/// Summary of one full pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub rows: usize,
    pub rendered: usize,
    pub unchanged: usize,
    pub merged: usize,
    pub stale: usize,
    pub detached: usize,
    pub failed: usize,
    pub defects: usize,
}

impl PassReport {
    fn record(&mut self, result: &Result<SyncOutcome, SyncError>) {
        match result {
            Ok(SyncOutcome::Rendered { .. }) => self.rendered += 1,
            Ok(SyncOutcome::Unchanged | SyncOutcome::AlreadyTracked) => self.unchanged += 1,
            Ok(SyncOutcome::Merged) => self.merged += 1,
            Ok(SyncOutcome::Stale) => self.stale += 1,
            Ok(SyncOutcome::Detached) => self.detached += 1,
            Err(err) if err.is_defect() => self.defects += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Result of [`SyncEngine::adopt_containers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerAdoption {
    /// Containers newly subscribed to.
    pub adopted: usize,
    /// Containers no longer on the page whose subscription was dropped.
    pub released: usize,
    /// Header cells inserted for the adopted containers.
    pub headers: usize,
}

/// The row sync engine. Always held in an `Rc`; see [`SyncEngine::new`].
pub struct SyncEngine {
    ctx: EngineContext,
    registry: RefCell<RowRegistry>,
    cache: RefCell<StatusCache>,
    headers: HeaderAugmenter,
    containers: RefCell<Vec<(NodeId, WatchGuard)>>,
    stats: EngineStats,
    closed: Cell<bool>,
    this: Weak<SyncEngine>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(ctx: EngineContext) -> Rc<Self> {
        let headers = HeaderAugmenter::new(ctx.config.header_label.clone());
        Rc::new_cyclic(|this| Self {
            ctx,
            registry: RefCell::new(RowRegistry::new()),
            cache: RefCell::new(StatusCache::new()),
            headers,
            containers: RefCell::new(Vec::new()),
            stats: EngineStats::default(),
            closed: Cell::new(false),
            this: this.clone(),
        })
    }

    #[must_use]
    pub fn page(&self) -> PageContext {
        self.ctx.page
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn HostTree> {
        &self.ctx.host
    }

    #[must_use]
    pub fn renderer(&self) -> &Rc<dyn Renderer> {
        &self.ctx.renderer
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn tracked_rows(&self) -> usize {
        self.registry.borrow().len()
    }

    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.registry.borrow().watcher_count()
    }

    #[must_use]
    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.registry.borrow().contains_node(node)
    }

    /// Containers the engine currently subscribes to.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.borrow().len()
    }

    #[must_use]
    pub fn is_header_augmented(&self, header: NodeId) -> bool {
        self.headers.is_augmented(header)
    }

    /// Count currently shown for `key`, if any fetch was applied.
    #[must_use]
    pub fn cached_count(&self, key: &RowKey) -> Option<usize> {
        self.cache.borrow().get(key)
    }

    pub(crate) fn weak(&self) -> Weak<SyncEngine> {
        self.this.clone()
    }

    /// Every row currently present under the tracked containers.
    #[must_use]
    pub fn current_rows(&self) -> Vec<NodeId> {
        let page = self.ctx.page;
        self.ctx
            .host
            .containers(&page)
            .into_iter()
            .flat_map(|container| self.ctx.host.row_nodes(container, &page))
            .collect()
    }

    /// Append the header cell to `header` unless it already has one.
    pub fn augment_header(&self, header: NodeId) -> bool {
        self.headers.augment(self.ctx.renderer.as_ref(), header)
    }

    /// Augment every header row already rendered in `containers`.
    pub fn augment_existing_headers(&self, containers: &[NodeId]) -> usize {
        self.headers.augment_existing(
            self.ctx.host.as_ref(),
            self.ctx.renderer.as_ref(),
            &self.ctx.page,
            containers,
        )
    }

    /// Bring the set of managed containers in line with the page: augment
    /// the header of and subscribe to every container not seen before, and
    /// release containers the host no longer renders.
    pub fn adopt_containers(&self) -> ContainerAdoption {
        if self.closed.get() {
            return ContainerAdoption::default();
        }
        let page = self.ctx.page;
        let present = self.ctx.host.containers(&page);
        let (released, fresh) = {
            let mut tracked = self.containers.borrow_mut();
            let (kept, released): (Vec<_>, Vec<_>) = std::mem::take(&mut *tracked)
                .into_iter()
                .partition(|(container, _)| present.contains(container));
            *tracked = kept;
            let fresh: Vec<NodeId> = present
                .iter()
                .copied()
                .filter(|&container| !tracked.iter().any(|(known, _)| *known == container))
                .collect();
            (released, fresh)
        };

        for (container, _) in &released {
            if let Some(header) = self.ctx.host.header_row(*container, &page) {
                self.headers.forget(header);
            }
            tracing::debug!(message = "container.release", container = %container);
        }
        let adoption = ContainerAdoption {
            adopted: fresh.len(),
            released: released.len(),
            headers: self.augment_existing_headers(&fresh),
        };
        drop(released);

        let guards = watcher::watch_containers(self, &fresh);
        self.containers
            .borrow_mut()
            .extend(fresh.into_iter().zip(guards));
        adoption
    }

    /// Stop remembering `header` once the host removed it.
    pub fn forget_header(&self, header: NodeId) -> bool {
        self.headers.forget(header)
    }

    /// Forget a removed row: dispose its watcher and drop its cached count.
    pub fn unregister(&self, node: NodeId) -> Option<RowKey> {
        let key = self.registry.borrow_mut().unregister(node)?;
        self.cache.borrow_mut().remove(&key);
        tracing::debug!(message = "row.unregister", row = %key, node = %node);
        Some(key)
    }

    /// Forget every container, row, and header. Used on shutdown; later
    /// passes and resyncs find nothing to do.
    pub fn detach_all(&self) {
        self.closed.set(true);
        // Take everything out first so disposal runs unborrowed.
        let containers = self.containers.take();
        drop(containers);
        let registry = self.registry.take();
        drop(registry);
        self.cache.borrow_mut().clear();
        self.headers.clear();
    }

    /// Resync `node` as an independent task. Failures are reported, never
    /// propagated.
    pub fn spawn_row_sync(&self, node: NodeId, trigger: SyncTrigger) {
        let Some(engine) = self.this.upgrade() else {
            return;
        };
        tokio::task::spawn_local(async move {
            if let Err(err) = engine.run_on_row(node, trigger).await {
                engine.report_failure(node, &err);
            }
        });
    }

    /// Resync every current row concurrently and wait for all of them.
    pub async fn full_pass(&self, trigger: SyncTrigger) -> PassReport {
        if self.closed.get() {
            return PassReport::default();
        }
        let adoption = self.adopt_containers();
        if adoption.adopted > 0 || adoption.released > 0 {
            tracing::debug!(
                message = "pass.containers",
                adopted = adoption.adopted,
                released = adoption.released,
                headers = adoption.headers
            );
        }
        let rows = self.current_rows();
        let mut report = PassReport {
            rows: rows.len(),
            ..PassReport::default()
        };
        let Some(engine) = self.this.upgrade() else {
            return report;
        };
        let span = tracing::debug_span!("prb.pass", rows = rows.len(), trigger = trigger.as_str());
        async move {
            let mut set = JoinSet::new();
            for node in rows {
                let engine = Rc::clone(&engine);
                set.spawn_local(async move {
                    let result = engine.run_on_row(node, trigger).await;
                    (node, result)
                });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((node, result)) => {
                        if let Err(err) = &result {
                            engine.report_failure(node, err);
                        }
                        report.record(&result);
                    }
                    Err(err) => {
                        tracing::error!(message = "pass.task_failed", error = %err);
                        report.failed += 1;
                    }
                }
            }
            tracing::debug!(
                message = "pass.done",
                rendered = report.rendered,
                unchanged = report.unchanged,
                merged = report.merged,
                failed = report.failed,
                defects = report.defects
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Bring one row's annotation up to date.
    pub async fn run_on_row(
        &self,
        node: NodeId,
        trigger: SyncTrigger,
    ) -> Result<SyncOutcome, SyncError> {
        let page = self.ctx.page;
        let href = self
            .ctx
            .host
            .row_link(node, &page)
            .ok_or(SyncError::MissingLink)?;
        let key = RowKey::new(href);
        let span = tracing::debug_span!(
            "prb.resync",
            row = %key,
            node = %node,
            trigger = trigger.as_str()
        );
        self.resync(node, key, trigger).instrument(span).await
    }

    async fn resync(
        &self,
        node: NodeId,
        key: RowKey,
        trigger: SyncTrigger,
    ) -> Result<SyncOutcome, SyncError> {
        if self.closed.get() {
            return Ok(SyncOutcome::Detached);
        }
        let page = self.ctx.page;
        let (current, relinked) = {
            let registry = self.registry.borrow();
            let current = registry.is_current(&key, node);
            (current, !current && registry.contains_node(node))
        };
        let first_run = match trigger {
            SyncTrigger::Inserted => true,
            SyncTrigger::Refresh => !current,
            // The watched row now links somewhere else.
            SyncTrigger::Mutated => relinked,
        };

        if first_run {
            if trigger != SyncTrigger::Inserted && !self.ctx.host.is_connected(node) {
                return Ok(SyncOutcome::Detached);
            }
            if !self.register(&key, node) {
                return Ok(SyncOutcome::AlreadyTracked);
            }
        } else if !current {
            return Ok(SyncOutcome::Detached);
        }

        if self.registry.borrow().is_merged(&key) {
            return Ok(SyncOutcome::Merged);
        }

        let state = self
            .ctx
            .host
            .status_marker(node, &page)
            .map_or(RowState::Open, |marker| RowState::from_marker(&marker));
        if state.is_merged() {
            self.settle_merged(&key, node);
            return Ok(SyncOutcome::Merged);
        }

        if first_run && page.watches_rows() && !self.registry.borrow().has_watcher(&key) {
            let handle = watcher::watch_row(self, node);
            self.registry.borrow_mut().attach_watcher(&key, node, handle);
        }

        let Some(endpoint) = PullRequestRef::parse(key.href()).endpoint() else {
            return Err(SyncError::UnrecognizedLink {
                href: key.href().to_string(),
            });
        };

        let ticket = self.registry.borrow_mut().issue_ticket(&key);
        bump(&self.stats.fetches_issued);
        tracing::trace!(message = "row.fetch", endpoint = %endpoint, ticket);
        let record = match self.ctx.fetch.fetch_blockers(&endpoint).await {
            Ok(record) => record,
            Err(source) => return Err(SyncError::Fetch { row: key, source }),
        };

        {
            let registry = self.registry.borrow();
            if !registry.is_current(&key, node) {
                return Ok(SyncOutcome::Detached);
            }
            if registry.is_merged(&key) {
                return Ok(SyncOutcome::Merged);
            }
        }

        let count = record.count();
        let decision = self.cache.borrow_mut().apply(&key, ticket, count);
        match decision {
            CacheDecision::Stale => {
                bump(&self.stats.stale_discards);
                tracing::debug!(message = "row.stale", ticket, count);
                Ok(SyncOutcome::Stale)
            }
            CacheDecision::Unchanged => {
                bump(&self.stats.unchanged_skips);
                Ok(SyncOutcome::Unchanged)
            }
            CacheDecision::Render => {
                let content = SlotContent::Status(Annotation::from_record(&record));
                self.ctx.renderer.render(node, &content);
                bump(&self.stats.renders);
                tracing::debug!(message = "row.render", count, glyph = content.glyph());
                Ok(SyncOutcome::Rendered { count })
            }
        }
    }

    /// First-sync registration. Returns false when the row was already
    /// tracked with this node.
    fn register(&self, key: &RowKey, node: NodeId) -> bool {
        let registration = self.registry.borrow_mut().register(key.clone(), node);
        // A node taken over from another link still shows that link's status.
        let stale_slot = match registration.evicted() {
            Some(evicted) => {
                self.cache.borrow_mut().remove(evicted);
                true
            }
            None => false,
        };
        match &registration {
            Registration::AlreadyPresent => return false,
            Registration::Replaced { previous, .. } => {
                // The new node starts with a fresh slot; the old count says
                // nothing about what it shows.
                self.cache.borrow_mut().remove(key);
                tracing::debug!(message = "row.replaced", previous = %previous);
            }
            Registration::Rebound { evicted } => {
                tracing::debug!(message = "row.rebound", evicted = %evicted);
            }
            Registration::New => tracing::debug!(message = "row.register"),
        }
        if !self.ctx.renderer.has_slot(node) {
            self.ctx.renderer.create_slot(node);
            self.ctx.renderer.render(node, &SlotContent::Pending);
        } else if stale_slot {
            self.ctx.renderer.render(node, &SlotContent::Pending);
        }
        true
    }

    fn settle_merged(&self, key: &RowKey, node: NodeId) {
        // Dispose the watcher outside the borrow so host callbacks can run.
        let handle = self.registry.borrow_mut().take_watcher(key);
        drop(handle);
        self.registry.borrow_mut().mark_merged(key);
        self.cache.borrow_mut().remove(key);
        self.ctx.renderer.render(node, &SlotContent::Merged);
        tracing::debug!(message = "row.merged");
    }

    /// Log a failed resync. Fetch failures emit one event per cause; link
    /// defects are escalated.
    pub fn report_failure(&self, node: NodeId, err: &SyncError) {
        match err {
            SyncError::Fetch { row, source } => {
                bump(&self.stats.fetch_failures);
                for cause in source.causes() {
                    tracing::error!(message = "row.fetch_failed", row = %row, node = %node, cause = %cause);
                }
            }
            defect => {
                bump(&self.stats.link_defects);
                tracing::error!(
                    message = "row.markup_defect",
                    node = %node,
                    defect = defect.is_defect(),
                    error = %defect
                );
            }
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("page", &self.ctx.page)
            .field("tracked_rows", &self.tracked_rows())
            .field("containers", &self.container_count())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_report_buckets_outcomes() {
        let mut report = PassReport::default();
        report.record(&Ok(SyncOutcome::Rendered { count: 2 }));
        report.record(&Ok(SyncOutcome::Merged));
        report.record(&Ok(SyncOutcome::Unchanged));
        report.record(&Err(SyncError::MissingLink));
        report.record(&Err(SyncError::Fetch {
            row: RowKey::new("/x"),
            source: prb_core::FetchError::transport("reset"),
        }));
        assert_eq!(
            report,
            PassReport {
                rows: 0,
                rendered: 1,
                unchanged: 1,
                merged: 1,
                stale: 0,
                detached: 0,
                failed: 1,
                defects: 1,
            }
        );
    }

    #[test]
    fn stats_snapshot_reflects_bumps() {
        let stats = EngineStats::default();
        bump(&stats.renders);
        bump(&stats.renders);
        bump(&stats.link_defects);
        let snap = stats.snapshot();
        assert_eq!(snap.renders, 2);
        assert_eq!(snap.link_defects, 1);
        assert_eq!(snap.fetches_issued, 0);
    }

    #[test]
    fn trigger_names_are_stable() {
        assert_eq!(SyncTrigger::Inserted.as_str(), "inserted");
        assert_eq!(SyncTrigger::Mutated.as_str(), "mutated");
        assert_eq!(SyncTrigger::Refresh.as_str(), "refresh");
    }
}
