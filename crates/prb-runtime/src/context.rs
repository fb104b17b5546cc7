#![forbid(unsafe_code)]

//! The explicit context every engine component is built from.

use std::fmt;
use std::rc::Rc;

use prb_core::{EngineConfig, Fetch, PageContext};

use crate::host::{HostTree, Renderer};

/// Page mode, configuration, and the three host collaborators.
///
/// Constructed once by the embedder and handed to [`crate::start`].
#[derive(Clone)]
pub struct EngineContext {
    pub page: PageContext,
    pub config: EngineConfig,
    pub host: Rc<dyn HostTree>,
    pub renderer: Rc<dyn Renderer>,
    pub fetch: Rc<dyn Fetch>,
}

impl EngineContext {
    /// Context with the default configuration.
    pub fn new(
        page: PageContext,
        host: Rc<dyn HostTree>,
        renderer: Rc<dyn Renderer>,
        fetch: Rc<dyn Fetch>,
    ) -> Self {
        Self {
            page,
            config: EngineConfig::default(),
            host,
            renderer,
            fetch,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("page", &self.page)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
