#![forbid(unsafe_code)]

//! Render model for a row's annotation slot.
//!
//! The engine decides *what* a slot shows; the host's renderer decides how
//! that looks. Keeping this as plain data lets tests compare slot contents
//! directly.

use crate::row::BlockerRecord;

/// Status icon shown in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    /// No blockers.
    Clear,
    /// At least one blocker.
    Blocked,
    /// No successful fetch yet.
    Pending,
}

impl Icon {
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Clear => "🟢",
            Self::Blocked => "⚠️",
            Self::Pending => "⏳",
        }
    }
}

/// A rendered blocker status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub icon: Icon,
    pub count: usize,
    /// Newline-joined veto messages; `None` when clear.
    pub tooltip: Option<String>,
}

impl Annotation {
    #[must_use]
    pub fn from_record(record: &BlockerRecord) -> Self {
        let count = record.count();
        if count == 0 {
            return Self {
                icon: Icon::Clear,
                count,
                tooltip: None,
            };
        }
        Self {
            icon: Icon::Blocked,
            count,
            tooltip: Some(record.messages().collect::<Vec<_>>().join("\n")),
        }
    }

    /// Count as displayed text.
    #[must_use]
    pub fn text(&self) -> String {
        self.count.to_string()
    }
}

/// Everything a slot can show over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    /// Created, waiting for the first successful fetch.
    Pending,
    /// Static placeholder for merged rows. No count, never updated.
    Merged,
    Status(Annotation),
}

impl SlotContent {
    /// Glyph for the slot's icon; merged rows show a dash.
    #[must_use]
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Pending => Icon::Pending.glyph(),
            Self::Merged => "—",
            Self::Status(annotation) => annotation.icon.glyph(),
        }
    }

    #[must_use]
    pub fn annotation(&self) -> Option<&Annotation> {
        match self {
            Self::Status(annotation) => Some(annotation),
            Self::Pending | Self::Merged => None,
        }
    }
}
