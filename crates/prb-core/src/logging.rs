#![forbid(unsafe_code)]

//! Global `tracing` subscriber setup.
//!
//! Library code only emits events; installing a subscriber is the embedder's
//! call. [`init`] is the usual entry point. The filter comes from `PRB_LOG`
//! when set, else from the argument.
//!
//! With the `tracing-json` feature the subscriber writes one JSON object per
//! line instead of the human-readable layout.

use tracing_subscriber::EnvFilter;

use crate::error::LoggingError;

/// Filter used when neither `PRB_LOG` nor the caller provides one.
pub const DEFAULT_FILTER: &str = "info";

/// Environment variable consulted for the log filter.
pub const FILTER_ENV: &str = "PRB_LOG";

/// Parse a filter directive string.
pub fn build_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|err| LoggingError::InvalidFilter {
        filter: directives.to_string(),
        message: err.to_string(),
    })
}

/// Install the global subscriber.
pub fn init(default_directives: &str) -> Result<(), LoggingError> {
    let directives =
        std::env::var(FILTER_ENV).unwrap_or_else(|_| default_directives.to_string());
    let filter = build_filter(&directives)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    #[cfg(feature = "tracing-json")]
    let result = builder.json().try_init();
    #[cfg(not(feature = "tracing-json"))]
    let result = builder.try_init();

    result.map_err(|_| LoggingError::AlreadyInstalled)
}
