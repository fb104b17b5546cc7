#![forbid(unsafe_code)]

//! Engine startup and lifetime.
//!
//! # Startup order
//!
//! 1. Validate the configuration.
//! 2. Adopt every container: augment its header row, so the header cell
//!    precedes any row slot, and subscribe to it.
//! 3. Run the initial pass: every present row takes the first-sync path,
//!    concurrently, and `start` waits for all of them.
//! 4. On pages that refresh periodically, start the [`RefreshScheduler`].
//!    Each periodic pass adopts containers rendered since the last one.
//!
//! Must be awaited inside a [`tokio::task::LocalSet`].

use std::rc::Rc;

use prb_core::ConfigError;

use crate::context::EngineContext;
use crate::scheduler::RefreshScheduler;
use crate::sync::{PassReport, StatsSnapshot, SyncEngine, SyncTrigger};

/// Start the engine on the page described by `ctx`.
pub async fn start(ctx: EngineContext) -> Result<EngineHandle, ConfigError> {
    ctx.config.validate()?;
    let engine = SyncEngine::new(ctx);
    let page = engine.page();
    tracing::info!(message = "engine.start", mode = ?page.mode());

    let adoption = engine.adopt_containers();

    let startup = engine.full_pass(SyncTrigger::Inserted).await;
    tracing::info!(
        message = "engine.ready",
        containers = adoption.adopted,
        headers = adoption.headers,
        rows = startup.rows,
        rendered = startup.rendered,
        merged = startup.merged,
        failed = startup.failed,
        defects = startup.defects
    );

    let scheduler = page
        .refreshes_periodically()
        .then(|| RefreshScheduler::spawn(&engine));

    Ok(EngineHandle {
        engine,
        scheduler,
        startup,
        stopped: false,
    })
}

/// A running engine. Dropping the handle stops it like [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct EngineHandle {
    engine: Rc<SyncEngine>,
    scheduler: Option<RefreshScheduler>,
    startup: PassReport,
    stopped: bool,
}

impl EngineHandle {
    #[must_use]
    pub fn engine(&self) -> &Rc<SyncEngine> {
        &self.engine
    }

    /// Report of the initial pass.
    #[must_use]
    pub fn startup_report(&self) -> PassReport {
        self.startup
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.scheduler.as_ref().is_some_and(RefreshScheduler::is_running)
    }

    #[must_use]
    pub fn container_watchers(&self) -> usize {
        self.engine.container_count()
    }

    /// Stop refreshing, drop container subscriptions, and dispose every row
    /// watcher. In-flight fetches finish but find their rows detached.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.engine.detach_all();
        tracing::info!(message = "engine.stop");
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
