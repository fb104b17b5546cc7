#![forbid(unsafe_code)]

//! Core: row identity, link parsing, page modes, wire types, and errors.
//!
//! Everything here is free of host and runtime concerns. The sync engine in
//! `prb-runtime` and the HTTP transport in `prb-web` both build on these
//! types.

pub mod annotation;
pub mod config;
pub mod error;
pub mod fetch;
pub mod link;
pub mod logging;
pub mod page;
pub mod row;

pub use annotation::{Annotation, Icon, SlotContent};
pub use config::EngineConfig;
pub use error::{ConfigError, FetchError, LoggingError, RemoteError, SyncError};
pub use fetch::Fetch;
pub use link::{Endpoint, PullRequestRef};
pub use page::{PageContext, PageMode, Selectors};
pub use row::{BlockerRecord, RowKey, RowState, Veto};
