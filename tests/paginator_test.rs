//! Infinite-scroll pagination against a page that grows as it scrolls

mod common;

use std::collections::HashSet;

use common::{fast_scroll, RecordingQueue, ScrollingPage};
use fbmedia::crawler::paginator::ScrollPaginator;
use fbmedia::error::PaginationError;

const ITEM_LINKS: &str = r#"a[href*="/photo/"]"#;

#[tokio::test]
async fn test_each_item_offered_once() {
    let page = ScrollingPage::new(25, 5, 5);
    let queue = RecordingQueue::default();

    let outcome = ScrollPaginator::new(ITEM_LINKS, &fast_scroll(2))
        .run(&page, &queue)
        .await
        .unwrap();

    let offered = queue.offered();
    let distinct: HashSet<_> = offered.iter().collect();
    assert_eq!(offered.len(), 25);
    assert_eq!(distinct.len(), 25);
    assert_eq!(outcome.total, 25);
    assert!(outcome.exhausted);
    assert_eq!(offered[0], "https://www.facebook.com/photo/?fbid=1&set=g.9");
}

#[tokio::test]
async fn test_max_entries_stops_after_exceeding() {
    let page = ScrollingPage::new(40, 4, 4);
    let queue = RecordingQueue::default();

    let outcome = ScrollPaginator::new(ITEM_LINKS, &fast_scroll(3))
        .with_max_items(Some(10))
        .run(&page, &queue)
        .await
        .unwrap();

    // 4, 8, then 12 > 10
    assert_eq!(outcome.total, 12);
    assert_eq!(page.scrolls(), 2);
    assert!(!outcome.exhausted);
    assert_eq!(queue.offered().len(), 12);
}

#[tokio::test]
async fn test_exhausted_after_idle_ticks() {
    let page = ScrollingPage::new(7, 4, 4);
    let queue = RecordingQueue::default();

    let outcome = ScrollPaginator::new(ITEM_LINKS, &fast_scroll(2))
        .with_max_items(Some(100))
        .run(&page, &queue)
        .await
        .unwrap();

    assert_eq!(outcome.total, 7);
    assert!(outcome.exhausted);
    // One productive scroll, then two that reveal nothing
    assert_eq!(page.scrolls(), 3);
    assert_eq!(outcome.ticks, 3);
}

#[tokio::test]
async fn test_custom_stop_predicate() {
    let page = ScrollingPage::new(30, 3, 3);
    let queue = RecordingQueue::default();

    let outcome = ScrollPaginator::new(ITEM_LINKS, &fast_scroll(2))
        .with_stop(|total| total >= 9)
        .run(&page, &queue)
        .await
        .unwrap();

    assert_eq!(outcome.total, 9);
    assert_eq!(page.scrolls(), 2);
}

#[tokio::test]
async fn test_enqueue_failure_keeps_earlier_batches() {
    let page = ScrollingPage::new(20, 4, 4);
    let queue = RecordingQueue::failing_on(2);

    let err = ScrollPaginator::new(ITEM_LINKS, &fast_scroll(2))
        .run(&page, &queue)
        .await
        .unwrap_err();

    assert!(matches!(err, PaginationError::Enqueue { count: 4, .. }));
    assert_eq!(queue.offered().len(), 4);
}
