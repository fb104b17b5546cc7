#![forbid(unsafe_code)]

//! Property-based invariant tests for pull-request link parsing.
//!
//! 1. Parsing never panics, whatever the input.
//! 2. Well-formed team links round-trip their fields into the endpoint.
//! 3. Personal links always produce a `~`-prefixed project key.
//! 4. Every recognized link yields an endpoint under the merge-status prefix.
//! 5. Links that do not end in `/overview` are never recognized.

use prb_core::link::{MERGE_STATUS_PREFIX, PullRequestRef};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn owner() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,12}"
}

fn repo() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9._-]{0,15}"
}

fn pr_id() -> impl Strategy<Value = u64> {
    1u64..1_000_000
}

fn host_prefix() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("https://bitbucket.example.com".to_string()),
        Just("http://localhost:7990/bitbucket".to_string()),
    ]
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn parse_never_panics(href in ".{0,200}") {
        let _ = PullRequestRef::parse(&href);
    }

    #[test]
    fn team_links_round_trip(prefix in host_prefix(), project in owner(), repo in repo(), id in pr_id()) {
        let href = format!("{prefix}/projects/{project}/repos/{repo}/pull-requests/{id}/overview");
        let parsed = PullRequestRef::parse(&href);
        prop_assert_eq!(
            &parsed,
            &PullRequestRef::Team { project: project.clone(), repo: repo.clone(), id }
        );
        let endpoint = parsed.endpoint().expect("recognized link has an endpoint");
        prop_assert_eq!(
            endpoint.path(),
            format!("{MERGE_STATUS_PREFIX}/{project}/repos/{repo}/pull-requests/{id}/merge")
        );
    }

    #[test]
    fn personal_links_use_tilde_project(user in owner(), repo in repo(), id in pr_id()) {
        let href = format!("/users/{user}/repos/{repo}/pull-requests/{id}/overview");
        let parsed = PullRequestRef::parse(&href);
        let expected = format!("~{user}");
        let project_key = parsed.project_key();
        prop_assert_eq!(project_key.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn recognized_links_target_merge_status(href in "(/projects|/users)/[a-z]{1,5}/repos/[a-z]{1,5}/pull-requests/[0-9]{1,4}/(overview|diff|commits)") {
        let parsed = PullRequestRef::parse(&href);
        if parsed.is_recognized() {
            let endpoint = parsed.endpoint().expect("recognized link has an endpoint");
            prop_assert!(endpoint.path().starts_with(MERGE_STATUS_PREFIX));
            prop_assert!(endpoint.path().ends_with("/merge"));
            prop_assert!(href.ends_with("/overview"));
        } else {
            prop_assert!(!href.ends_with("/overview"));
        }
    }
}
