#![forbid(unsafe_code)]

//! Row identity, terminal state, and fetched blocker records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a row, taken from its title link.
///
/// The host may recreate a row's node or patch it in place, so node identity
/// is useless as a key. The link survives both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    #[must_use]
    pub fn href(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a row can still change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowState {
    Open,
    /// Terminal: never fetched, never watched.
    Merged,
}

impl RowState {
    /// Classify the text of a row's status marker.
    ///
    /// Only "merged" is terminal; declined or unknown markers stay open so a
    /// reopened pull request keeps being tracked.
    #[must_use]
    pub fn from_marker(marker: &str) -> Self {
        if marker.trim().eq_ignore_ascii_case("merged") {
            Self::Merged
        } else {
            Self::Open
        }
    }

    #[must_use]
    pub const fn is_merged(self) -> bool {
        matches!(self, Self::Merged)
    }
}

/// One reason a pull request cannot be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Veto {
    #[serde(default)]
    pub summary_message: Option<String>,
    pub detailed_message: String,
}

impl Veto {
    #[must_use]
    pub fn new(detailed_message: impl Into<String>) -> Self {
        Self {
            summary_message: None,
            detailed_message: detailed_message.into(),
        }
    }
}

/// Remote merge status for one row, recomputed on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockerRecord {
    vetoes: Vec<Veto>,
}

impl BlockerRecord {
    #[must_use]
    pub fn new(vetoes: Vec<Veto>) -> Self {
        Self { vetoes }
    }

    #[must_use]
    pub fn clear() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.vetoes.len()
    }

    #[must_use]
    pub fn vetoes(&self) -> &[Veto] {
        &self.vetoes
    }

    /// Detailed messages in the order the server returned them.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.vetoes.iter().map(|v| v.detailed_message.as_str())
    }
}
