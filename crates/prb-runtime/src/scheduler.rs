#![forbid(unsafe_code)]

//! Periodic full passes.
//!
//! The scheduler ticks every `refresh_interval` and spawns a detached full
//! pass on each tick. It never waits for the previous pass, so a slow fetch
//! cannot stretch the refresh cadence; the status cache's tickets sort out
//! results that arrive out of order.

use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::sync::{SyncEngine, SyncTrigger};

/// Handle to the refresh loop. Dropping it stops the loop; passes already
/// spawned run to completion.
#[derive(Debug)]
pub struct RefreshScheduler {
    period: Duration,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start ticking. The first pass runs one period from now.
    pub fn spawn(engine: &Rc<SyncEngine>) -> Self {
        let period = engine.config().refresh_interval;
        let weak = Rc::downgrade(engine);
        let task = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                tracing::trace!(message = "refresh.tick");
                tokio::task::spawn_local(async move {
                    engine.full_pass(SyncTrigger::Refresh).await;
                });
            }
        });
        tracing::debug!(message = "refresh.start", period_ms = period_millis(period));
        Self { period, task }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

/// `period` in whole milliseconds, saturating at `u64::MAX`.
fn period_millis(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_millis_saturates() {
        assert_eq!(period_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(period_millis(Duration::from_micros(1_999)), 1);
        assert_eq!(period_millis(Duration::MAX), u64::MAX);
    }
}
