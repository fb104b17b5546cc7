//! End-to-end engine behavior on a repository's pull-request list.

use std::time::Duration;

use prb_core::{Annotation, Icon, SlotContent};
use prb_harness::{Page, merge_path, settle, team_link, vetoes};
use prb_runtime::{HostTree, start};
use tokio::task::LocalSet;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn rows_are_annotated_once_without_watchers_or_refresh() {
    LocalSet::new()
        .run_until(async {
            let (page, table, body) = Page::list_view();
            let row = page.doc.add_row(body, &team_link("P", "r", 1));
            let path = merge_path("P", "r", 1);
            page.fetch.respond(&path, vetoes(&["needs approval"]));

            let handle = start(page.context()).await.unwrap();

            assert!(!handle.is_refreshing());
            assert_eq!(handle.engine().watcher_count(), 0);
            assert_eq!(page.doc.active_row_watchers(), 0);
            assert_eq!(
                page.doc.slot(row),
                Some(SlotContent::Status(Annotation {
                    icon: Icon::Blocked,
                    count: 1,
                    tooltip: Some("needs approval".into()),
                }))
            );
            let header = page.doc.header_row(table, &page.page).unwrap();
            assert_eq!(page.doc.header_cells(header), vec!["Blockers".to_string()]);

            page.doc.touch(row);
            sleep(Duration::from_secs(60)).await;
            assert_eq!(page.fetch.calls_for(&path), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn rows_inside_inserted_bodies_are_picked_up() {
    LocalSet::new()
        .run_until(async {
            let (page, table, body) = Page::list_view();
            let handle = start(page.context()).await.unwrap();
            assert_eq!(handle.startup_report().rows, 0);
            assert_eq!(page.doc.active_container_watchers(), 1);

            let first = team_link("P", "r", 1);
            let second = team_link("P", "r", 2);
            let (_, rows) = page.doc.add_populated_group(table, &[first.as_str(), second.as_str()]);
            let nested = page.doc.add_row(body, &team_link("P", "r", 3));
            settle().await;

            for row in rows.iter().copied().chain([nested]) {
                assert!(
                    matches!(page.doc.slot(row), Some(SlotContent::Status(_))),
                    "row {row} was not annotated"
                );
            }
            assert_eq!(page.fetch.call_count(), 3);
            assert_eq!(handle.engine().tracked_rows(), 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn removed_rows_stay_registered() {
    LocalSet::new()
        .run_until(async {
            let (page, _, body) = Page::list_view();
            let row = page.doc.add_row(body, &team_link("P", "r", 1));
            let handle = start(page.context()).await.unwrap();

            page.doc.remove(row);
            settle().await;
            assert_eq!(handle.engine().tracked_rows(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn merged_rows_get_the_placeholder() {
    LocalSet::new()
        .run_until(async {
            let (page, _, body) = Page::list_view();
            let row = page.doc.add_merged_row(body, &team_link("P", "r", 4));
            let _handle = start(page.context()).await.unwrap();
            assert_eq!(page.doc.slot(row), Some(SlotContent::Merged));
            assert_eq!(page.fetch.call_count(), 0);
        })
        .await;
}
