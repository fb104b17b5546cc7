#![forbid(unsafe_code)]

//! Row sync engine for pull-request blocker annotations.
//!
//! The engine discovers pull-request rows through a [`HostTree`], keeps one
//! annotation slot per row current through a [`Renderer`], and pulls status
//! from a [`prb_core::Fetch`] implementation. Everything runs on a single
//! thread inside a [`tokio::task::LocalSet`].
//!
//! Entry point: [`start`].

pub mod context;
pub mod debounce;
pub mod header;
pub mod host;
pub mod program;
pub mod registry;
pub mod scheduler;
pub mod status_cache;
pub mod sync;
pub mod watcher;

pub use context::EngineContext;
pub use debounce::Debouncer;
pub use header::HeaderAugmenter;
pub use host::{
    ChildCallback, ChildEvent, HostTree, MutationCallback, MutationKind, NodeId, NodeKind,
    Renderer, RowMutation, WatchGuard,
};
pub use program::{EngineHandle, start};
pub use registry::{Registration, RowRegistry, WatcherHandle};
pub use scheduler::RefreshScheduler;
pub use status_cache::{CacheDecision, StatusCache};
pub use sync::{
    ContainerAdoption, EngineStats, PassReport, StatsSnapshot, SyncEngine, SyncOutcome,
    SyncTrigger,
};
