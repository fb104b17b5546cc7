#![forbid(unsafe_code)]

//! Page builders and link helpers shared by the end-to-end tests.

use std::rc::Rc;
use std::time::Duration;

use prb_core::{EngineConfig, PageContext};
use prb_runtime::{EngineContext, NodeId};

use crate::document::SimDocument;
use crate::fetch::ScriptedFetch;

pub const REVIEWING: &str = "reviewing-pull-requests";
pub const CREATED: &str = "created-pull-requests";
pub const TABLE: &str = "pull-requests-table";

/// Row link for a team project.
#[must_use]
pub fn team_link(project: &str, repo: &str, id: u64) -> String {
    format!("/projects/{project}/repos/{repo}/pull-requests/{id}/overview")
}

/// Row link for a personal repository.
#[must_use]
pub fn personal_link(user: &str, repo: &str, id: u64) -> String {
    format!("/users/{user}/repos/{repo}/pull-requests/{id}/overview")
}

/// Merge-status path for `project_key` (`~user` for personal repositories).
#[must_use]
pub fn merge_path(project_key: &str, repo: &str, id: u64) -> String {
    format!("/rest/ui/latest/projects/{project_key}/repos/{repo}/pull-requests/{id}/merge")
}

/// Let every ready task run without reaching any engine timer.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A simulated page wired to a scripted fetcher.
pub struct Page {
    pub doc: Rc<SimDocument>,
    pub fetch: Rc<ScriptedFetch>,
    pub page: PageContext,
    pub config: EngineConfig,
}

impl Page {
    /// Dashboard with empty "reviewing" and "created" sections, each with a
    /// header row. Returns the page and the two containers.
    #[must_use]
    pub fn dashboard() -> (Self, NodeId, NodeId) {
        let doc = SimDocument::new();
        let reviewing = doc.add_container(REVIEWING);
        doc.add_header(reviewing);
        let created = doc.add_container(CREATED);
        doc.add_header(created);
        (Self::new(doc, PageContext::dashboard()), reviewing, created)
    }

    /// List view with a header row and one empty table body. Returns the page,
    /// the table container, and the body.
    #[must_use]
    pub fn list_view() -> (Self, NodeId, NodeId) {
        let doc = SimDocument::new();
        let table = doc.add_container(TABLE);
        doc.add_header(table);
        let body = doc.add_group(table);
        (Self::new(doc, PageContext::list_view()), table, body)
    }

    #[must_use]
    pub fn new(doc: Rc<SimDocument>, page: PageContext) -> Self {
        Self {
            doc,
            fetch: ScriptedFetch::new(),
            page,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> EngineContext {
        EngineContext::new(
            self.page,
            self.doc.clone(),
            self.doc.clone(),
            self.fetch.clone(),
        )
        .with_config(self.config.clone())
    }
}
