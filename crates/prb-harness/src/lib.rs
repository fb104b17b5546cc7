#![forbid(unsafe_code)]

//! Test harness for the blocker annotation engine.
//!
//! - [`SimDocument`]: in-memory host page implementing `HostTree` and
//!   `Renderer`.
//! - [`ScriptedFetch`]: `Fetch` implementation replaying queued results.
//! - [`LogCapture`]: tracing layer recording events for assertions.
//! - [`fixtures`]: page builders and link helpers.

pub mod document;
pub mod fetch;
pub mod fixtures;
pub mod logs;
pub mod topic;

pub use document::SimDocument;
pub use fetch::{ScriptedFetch, vetoes};
pub use fixtures::{Page, merge_path, personal_link, settle, team_link};
pub use logs::{CapturedEvent, CapturedLogs, LogCapture};
pub use topic::Topic;
