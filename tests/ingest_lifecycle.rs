//! Integration tests for the ingestion cycle: select, mark, fetch, persist.
//!
//! Each test creates its own in-memory SQLite database and wiremock server.
//! These tests drive `Scheduler::tick` directly so they never wait on the
//! polling interval.

use gator::feed::{FeedClient, FetchError};
use gator::ingest::{Scheduler, TickError};
use gator::storage::{Database, DatabaseError, Feed};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREE_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>Test Blog</title>
  <link>https://blog.example.com/</link>
  <description>Posts</description>
  <item>
    <title>First &amp;amp; foremost</title>
    <link>https://blog.example.com/1</link>
    <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
    <description>one</description>
  </item>
  <item>
    <title>Second</title>
    <link>https://blog.example.com/2</link>
    <pubDate>02 Jan 2006</pubDate>
  </item>
  <item>
    <title>Third</title>
    <link>https://blog.example.com/3</link>
    <pubDate>Tue, 03 Jan 2006 09:00:00 +0000</pubDate>
  </item>
</channel>
</rss>"#;

fn rss_with_items(items: &[(&str, &str)]) -> String {
    let mut body = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>"#);
    for (title, link) in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>",
            title, link
        ));
    }
    body.push_str("</channel></rss>");
    body
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

async fn setup() -> (Database, Scheduler, i64) {
    let db = Database::open(":memory:").await.unwrap();
    let user = db.create_user("alice").await.unwrap();
    let client = FeedClient::new("gator", Duration::from_secs(5)).unwrap();
    let scheduler = Scheduler::new(db.clone(), client, Duration::from_secs(30)).unwrap();
    (db, scheduler, user.id)
}

async fn add_feed(db: &Database, user_id: i64, name: &str, url: &str) -> Feed {
    db.create_feed(name, url, user_id).await.unwrap()
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_ingesting_same_document_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss_with_items(&[
            ("A", "https://blog.example.com/a"),
            ("B", "https://blog.example.com/b"),
        ]),
    )
    .await;

    let (db, scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;
    let cancel = CancellationToken::new();

    let first = scheduler.tick(&cancel).await.unwrap();
    assert_eq!(first.feed_id, feed.id);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.duplicates, 0);
    let count_after_first = db.post_count().await.unwrap();

    let second = scheduler.tick(&cancel).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(db.post_count().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn test_new_items_picked_up_on_later_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_with_items(&[(
            "A",
            "https://blog.example.com/a",
        )])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/feed",
        rss_with_items(&[
            ("B", "https://blog.example.com/b"),
            ("A", "https://blog.example.com/a"),
        ]),
    )
    .await;

    let (db, scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;
    let cancel = CancellationToken::new();

    scheduler.tick(&cancel).await.unwrap();
    let second = scheduler.tick(&cancel).await.unwrap();

    assert_eq!(second.inserted, 1);
    assert_eq!(second.duplicates, 1);
    assert_eq!(db.posts_for_feed(feed.id).await.unwrap().len(), 2);
}

// ============================================================================
// Fair rotation
// ============================================================================

#[tokio::test]
async fn test_each_feed_selected_once_before_any_repeats() {
    let server = MockServer::start().await;
    for route in ["/a", "/b", "/c"] {
        mount_feed(&server, route, rss_with_items(&[])).await;
    }

    let (db, scheduler, user_id) = setup().await;
    let mut expected = Vec::new();
    for (name, route) in [("A", "/a"), ("B", "/b"), ("C", "/c")] {
        let feed = add_feed(&db, user_id, name, &format!("{}{}", server.uri(), route)).await;
        expected.push(feed.id);
    }

    let cancel = CancellationToken::new();
    let mut selected = Vec::new();
    for _ in 0..6 {
        selected.push(scheduler.tick(&cancel).await.unwrap().feed_id);
    }

    // Never-fetched feeds first in id order, then the same rotation again
    let mut twice = expected.clone();
    twice.extend(expected.iter().copied());
    assert_eq!(selected, twice);
}

// ============================================================================
// Fault isolation
// ============================================================================

#[tokio::test]
async fn test_failing_feed_does_not_block_the_next_one() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/good",
        rss_with_items(&[("Ok", "https://b.example.com/ok")]),
    )
    .await;

    let (db, scheduler, user_id) = setup().await;
    // Feed A points at a closed port
    let feed_a = add_feed(&db, user_id, "A", "http://127.0.0.1:1/rss").await;
    let feed_b = add_feed(&db, user_id, "B", &format!("{}/good", server.uri())).await;
    let cancel = CancellationToken::new();

    let first = scheduler.tick(&cancel).await;
    match first {
        Err(TickError::Fetch {
            feed_id,
            source: FetchError::Request(_),
            ..
        }) => assert_eq!(feed_id, feed_a.id),
        other => panic!("expected transport failure for feed A, got {:?}", other),
    }

    let second = scheduler.tick(&cancel).await.unwrap();
    assert_eq!(second.feed_id, feed_b.id);
    assert_eq!(second.inserted, 1);
}

#[tokio::test]
async fn test_failed_feed_still_rotates_to_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let (db, scheduler, user_id) = setup().await;
    let broken = add_feed(&db, user_id, "Broken", &format!("{}/broken", server.uri())).await;

    let result = scheduler.tick(&CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(TickError::Fetch {
            source: FetchError::Decode(_),
            ..
        })
    ));

    // Marked before the fetch, so the failure still advanced its timestamp
    let refreshed = db.feed_by_id(broken.id).await.unwrap();
    assert!(refreshed.last_fetched_at.is_some());
}

#[tokio::test]
async fn test_cancelled_tick_reports_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_with_items(&[]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let (db, scheduler, user_id) = setup().await;
    add_feed(&db, user_id, "Slow", &format!("{}/slow", server.uri())).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = scheduler.tick(&cancel).await;
    assert!(matches!(
        result,
        Err(TickError::Fetch {
            source: FetchError::Cancelled,
            ..
        })
    ));
    assert_eq!(db.post_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_directory_skips_tick() {
    let (_db, scheduler, _) = setup().await;
    assert!(matches!(
        scheduler.tick(&CancellationToken::new()).await,
        Err(TickError::NoFeeds)
    ));
}

// ============================================================================
// Partial-batch resilience
// ============================================================================

#[tokio::test]
async fn test_bad_pub_date_skips_only_that_item() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", THREE_ITEMS.to_string()).await;

    let (db, scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;

    let summary = scheduler.tick(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let mut urls: Vec<String> = db
        .posts_for_feed(feed.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec!["https://blog.example.com/1", "https://blog.example.com/3"]
    );
}

#[tokio::test]
async fn test_item_without_pub_date_is_skipped() {
    let server = MockServer::start().await;
    let body = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>
        <item><title>Undated</title><link>https://blog.example.com/undated</link></item>
        <item><title>Dated</title><link>https://blog.example.com/dated</link>
            <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>
    </channel></rss>"#;
    mount_feed(&server, "/feed", body.to_string()).await;

    let (db, scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;

    let summary = scheduler.tick(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 1);

    let posts = db.posts_for_feed(feed.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, "https://blog.example.com/dated");
}

#[tokio::test]
async fn test_truncated_document_stores_nothing() {
    let server = MockServer::start().await;
    let body = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title><item><title>A</title><link>https://blog.example.com/a</link><pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate></item>"#;
    mount_feed(&server, "/feed", body.to_string()).await;

    let (db, scheduler, user_id) = setup().await;
    add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;

    let result = scheduler.tick(&CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(TickError::Fetch {
            source: FetchError::Decode(_),
            ..
        })
    ));
    assert_eq!(db.post_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_stored_post_fields() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", THREE_ITEMS.to_string()).await;

    let (db, scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Blog", &format!("{}/feed", server.uri())).await;
    scheduler.tick(&CancellationToken::new()).await.unwrap();

    let posts = db.posts_for_feed(feed.id).await.unwrap();
    let first = posts
        .iter()
        .find(|p| p.url == "https://blog.example.com/1")
        .unwrap();
    let third = posts
        .iter()
        .find(|p| p.url == "https://blog.example.com/3")
        .unwrap();

    // Double-encoded entity decoded once by XML, once as HTML
    assert_eq!(first.title, "First & foremost");
    assert_eq!(first.description.as_deref(), Some("one"));
    assert_eq!(first.published_at, Some(1_136_214_245_000));
    assert_eq!(third.description, None);
}

// ============================================================================
// Store contract
// ============================================================================

#[tokio::test]
async fn test_mark_fetched_on_vanished_feed() {
    let (db, _scheduler, user_id) = setup().await;
    let feed = add_feed(&db, user_id, "Gone", "https://gone.example/rss").await;
    db.reset().await.unwrap();

    assert!(matches!(
        db.mark_fetched(feed.id).await,
        Err(DatabaseError::FeedNotFound(id)) if id == feed.id
    ));
}
