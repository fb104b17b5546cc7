#![forbid(unsafe_code)]

//! Pull-request link parsing and merge-status endpoint construction.
//!
//! A row is identified by the `href` of its title link. Two link shapes are
//! accepted:
//!
//! ```text
//! /projects/<project>/repos/<repo>/pull-requests/<id>/overview   (team)
//! /users/<user>/repos/<repo>/pull-requests/<id>/overview         (personal)
//! ```
//!
//! Personal repositories live under the `~<user>` project key on the REST
//! side, so the owner is rewritten before the endpoint is built.
//!
//! Anything else parses to [`PullRequestRef::Unrecognized`]. That variant is
//! a markup defect, not a row to skip quietly; the engine escalates it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix shared by every merge-status endpoint.
pub const MERGE_STATUS_PREFIX: &str = "/rest/ui/latest/projects";

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/(?<scope>projects|users)/(?<owner>\w+)/repos/(?<repo>\S+)/pull-requests/(?<id>\d+)/overview",
    )
    .expect("link pattern must compile")
});

/// Typed result of parsing a row link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PullRequestRef {
    /// A pull request in a team-owned project.
    Team {
        project: String,
        repo: String,
        id: u64,
    },
    /// A pull request in a user's personal repository.
    Personal { user: String, repo: String, id: u64 },
    /// The link does not match either accepted shape.
    Unrecognized { href: String },
}

impl PullRequestRef {
    /// Parse a row link. Absolute URLs are accepted; only the path shape
    /// matters.
    #[must_use]
    pub fn parse(href: &str) -> Self {
        let Some(caps) = LINK_PATTERN.captures(href) else {
            return Self::Unrecognized {
                href: href.to_string(),
            };
        };
        // An id too large for u64 is as foreign to us as a missing one.
        let Ok(id) = caps["id"].parse::<u64>() else {
            return Self::Unrecognized {
                href: href.to_string(),
            };
        };
        let owner = caps["owner"].to_string();
        let repo = caps["repo"].to_string();
        match &caps["scope"] {
            "users" => Self::Personal {
                user: owner,
                repo,
                id,
            },
            _ => Self::Team {
                project: owner,
                repo,
                id,
            },
        }
    }

    /// Project key as the REST API expects it (`~user` for personal repos).
    #[must_use]
    pub fn project_key(&self) -> Option<String> {
        match self {
            Self::Team { project, .. } => Some(project.clone()),
            Self::Personal { user, .. } => Some(format!("~{user}")),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Merge-status endpoint for this pull request, if recognized.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        let project = self.project_key()?;
        let (repo, id) = match self {
            Self::Team { repo, id, .. } | Self::Personal { repo, id, .. } => (repo, *id),
            Self::Unrecognized { .. } => return None,
        };
        Some(Endpoint {
            path: format!("{MERGE_STATUS_PREFIX}/{project}/repos/{repo}/pull-requests/{id}/merge"),
        })
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized { .. })
    }
}

/// Server-relative path of a merge-status request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: String,
}

impl Endpoint {
    /// Wrap an already-built path. Used by fixtures and transports that
    /// replay recorded traffic.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn team_link_builds_project_endpoint() {
        let pr = PullRequestRef::parse("/projects/ABC/repos/myrepo/pull-requests/42/overview");
        assert_eq!(
            pr,
            PullRequestRef::Team {
                project: "ABC".into(),
                repo: "myrepo".into(),
                id: 42,
            }
        );
        assert_eq!(
            pr.endpoint().map(|e| e.path().to_string()),
            Some("/rest/ui/latest/projects/ABC/repos/myrepo/pull-requests/42/merge".to_string())
        );
    }

    #[test]
    fn personal_link_prefixes_owner_with_tilde() {
        let pr = PullRequestRef::parse("/users/alice/repos/myrepo/pull-requests/7/overview");
        assert!(matches!(pr, PullRequestRef::Personal { ref user, id: 7, .. } if user == "alice"));
        assert_eq!(
            pr.endpoint().map(|e| e.to_string()),
            Some("/rest/ui/latest/projects/~alice/repos/myrepo/pull-requests/7/merge".to_string())
        );
    }

    #[test]
    fn absolute_url_is_accepted() {
        let pr = PullRequestRef::parse(
            "https://bitbucket.example.com/projects/OPS/repos/infra-tools/pull-requests/1001/overview",
        );
        assert_eq!(pr.project_key().as_deref(), Some("OPS"));
        assert!(pr.is_recognized());
    }

    #[test]
    fn commits_tab_is_unrecognized() {
        let href = "/projects/ABC/repos/myrepo/pull-requests/42/commits";
        let pr = PullRequestRef::parse(href);
        assert_eq!(pr, PullRequestRef::Unrecognized { href: href.into() });
        assert_eq!(pr.endpoint(), None);
        assert_eq!(pr.project_key(), None);
    }

    #[test]
    fn overflowing_id_is_unrecognized() {
        let pr = PullRequestRef::parse(
            "/projects/ABC/repos/r/pull-requests/99999999999999999999999/overview",
        );
        assert!(!pr.is_recognized());
    }

    #[test]
    fn empty_href_is_unrecognized() {
        assert!(!PullRequestRef::parse("").is_recognized());
    }
}
