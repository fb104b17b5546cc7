#![forbid(unsafe_code)]

//! Page modes and the discovery rules that go with them.
//!
//! The host renders pull requests in two places that behave differently:
//!
//! | | Dashboard | ListView |
//! |---|---|---|
//! | containers | reviewing + created sections | one list table |
//! | container watch | direct children | whole subtree |
//! | rows removed in place | yes | never (host navigates away) |
//! | per-row watcher | yes | no |
//! | periodic refresh | yes | no |
//!
//! [`PageContext`] is resolved once at startup and never changes afterwards.
//! Which mode is active is decided by whoever embeds the engine.

/// The two supported host views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageMode {
    /// The personal dashboard with "reviewing" and "created" sections.
    Dashboard,
    /// A repository's pull-request list.
    ListView,
}

/// CSS selectors a DOM-backed host uses for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selectors {
    /// Matches every row container.
    pub containers: &'static str,
    /// Matches rows inside a container.
    pub rows: &'static str,
    /// Matches the header row inside a container.
    pub header: &'static str,
    /// Matches a row's title link (relative to the row).
    pub link: &'static str,
    /// Matches a row's status marker (relative to the row).
    pub status: &'static str,
}

const DASHBOARD_SECTIONS: &[&str] = &["reviewing-pull-requests", "created-pull-requests"];
const LIST_VIEW_SECTIONS: &[&str] = &["pull-requests-table"];

const DASHBOARD_SELECTORS: Selectors = Selectors {
    containers: ":is(.reviewing-pull-requests, .created-pull-requests)",
    rows: ".pull-request-row",
    header: "thead tr",
    link: ".summary-column .title > a[href]",
    status: ".state-column .pull-request-state-lozenge",
};

const LIST_VIEW_SELECTORS: Selectors = Selectors {
    containers: ".pull-requests-table",
    rows: "tbody:not(:empty) .pull-request-row",
    header: "thead tr",
    link: ".title a.pull-request-title[href]",
    status: ".pull-request-state .pull-request-state-lozenge",
};

/// Immutable page description threaded through every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageContext {
    mode: PageMode,
}

impl PageContext {
    #[must_use]
    pub const fn new(mode: PageMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn dashboard() -> Self {
        Self::new(PageMode::Dashboard)
    }

    #[must_use]
    pub const fn list_view() -> Self {
        Self::new(PageMode::ListView)
    }

    #[must_use]
    pub const fn mode(&self) -> PageMode {
        self.mode
    }

    /// Class names of the sections that hold rows.
    #[must_use]
    pub const fn sections(&self) -> &'static [&'static str] {
        match self.mode {
            PageMode::Dashboard => DASHBOARD_SECTIONS,
            PageMode::ListView => LIST_VIEW_SECTIONS,
        }
    }

    #[must_use]
    pub const fn selectors(&self) -> Selectors {
        match self.mode {
            PageMode::Dashboard => DASHBOARD_SELECTORS,
            PageMode::ListView => LIST_VIEW_SELECTORS,
        }
    }

    /// The list view builds nested table bodies lazily, so its container
    /// must be watched recursively.
    #[must_use]
    pub const fn watch_recursively(&self) -> bool {
        matches!(self.mode, PageMode::ListView)
    }

    /// Whether the host removes rows in place (and we must unregister them).
    #[must_use]
    pub const fn tracks_removals(&self) -> bool {
        matches!(self.mode, PageMode::Dashboard)
    }

    /// Whether each open row gets its own subtree watcher.
    #[must_use]
    pub const fn watches_rows(&self) -> bool {
        matches!(self.mode, PageMode::Dashboard)
    }

    /// Whether a periodic full refresh runs.
    #[must_use]
    pub const fn refreshes_periodically(&self) -> bool {
        matches!(self.mode, PageMode::Dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_enables_fine_grained_tracking() {
        let page = PageContext::dashboard();
        assert!(page.watches_rows());
        assert!(page.refreshes_periodically());
        assert!(page.tracks_removals());
        assert!(!page.watch_recursively());
        assert_eq!(page.sections().len(), 2);
    }

    #[test]
    fn list_view_relies_on_container_events() {
        let page = PageContext::list_view();
        assert!(!page.watches_rows());
        assert!(!page.refreshes_periodically());
        assert!(!page.tracks_removals());
        assert!(page.watch_recursively());
        assert_eq!(page.sections(), &["pull-requests-table"]);
    }

    #[test]
    fn modes_locate_links_differently() {
        assert_ne!(
            PageContext::dashboard().selectors().link,
            PageContext::list_view().selectors().link
        );
    }
}
