use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::row::RowKey;

/// One entry of a server-side `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub exception_name: Option<String>,
}

impl RemoteError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            context: None,
            message: message.into(),
            exception_name: None,
        }
    }
}

/// Why a merge-status fetch produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("malformed merge status body: {message}")]
    Decode { message: String },

    #[error("server reported {} error(s)", .errors.len())]
    Remote { errors: Vec<RemoteError> },
}

impl FetchError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote(errors: Vec<RemoteError>) -> Self {
        Self::Remote { errors }
    }

    /// Underlying causes, one per entry for aggregate failures.
    #[must_use]
    pub fn causes(&self) -> Vec<String> {
        match self {
            Self::Remote { errors } if !errors.is_empty() => errors
                .iter()
                .map(|e| match &e.exception_name {
                    Some(name) => format!("{} ({name})", e.message),
                    None => e.message.clone(),
                })
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Why a row resync stopped without rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("row has no title link")]
    MissingLink,

    #[error("unsupported pull-request link: {href}")]
    UnrecognizedLink { href: String },

    #[error("fetch failed for {row}: {source}")]
    Fetch {
        row: RowKey,
        #[source]
        source: FetchError,
    },
}

impl SyncError {
    /// Markup defects mean the host changed under us; they are escalated
    /// instead of being treated as transient.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::MissingLink | Self::UnrecognizedLink { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be non-zero (got {value:?})")]
    ZeroDuration { field: &'static str, value: Duration },

    #[error("header label must not be empty")]
    EmptyHeaderLabel,

    #[error("invalid base URL {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}
