#![forbid(unsafe_code)]

//! Pull-request blocker annotations public facade crate.
//!
//! This crate provides the stable surface area for embedders.

pub use prb_runtime::{EngineContext, EngineHandle, start};

pub mod prelude {
    pub use prb_core as core;
    pub use prb_runtime as runtime;
    #[cfg(feature = "web")]
    pub use prb_web as web;
}
