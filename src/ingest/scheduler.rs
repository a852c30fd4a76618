use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::normalize::normalize_item;
use crate::config::ConfigError;
use crate::feed::{FeedClient, FetchError, RawFeedItem};
use crate::storage::{Database, DatabaseError, Feed, InsertOutcome};

/// Why a tick processed no feed document.
///
/// Every variant is scoped to a single tick; [`Scheduler::run`] logs it and
/// carries on.
#[derive(Debug, Error)]
pub enum TickError {
    /// Empty feed directory; the tick is skipped
    #[error("No feeds registered")]
    NoFeeds,
    #[error("Failed to select next feed: {0}")]
    Select(#[source] DatabaseError),
    /// Includes the feed disappearing between selection and marking
    #[error("Failed to mark feed {feed_id} as fetched: {source}")]
    MarkFetched {
        feed_id: i64,
        #[source]
        source: DatabaseError,
    },
    #[error("Failed to fetch feed {feed_id} ({url}): {source}")]
    Fetch {
        feed_id: i64,
        url: String,
        #[source]
        source: FetchError,
    },
}

impl TickError {
    /// True when the feed's document never arrived intact.
    pub fn is_transport(&self) -> bool {
        matches!(self, TickError::Fetch { source, .. } if source.is_transport())
    }
}

/// What one successful tick did with a feed's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub feed_id: i64,
    /// New posts stored
    pub inserted: usize,
    /// Items already stored on an earlier pass
    pub duplicates: usize,
    /// Items dropped for a missing or unparseable publish date
    pub skipped: usize,
    /// Items the store refused for any other reason
    pub failed: usize,
}

/// Polls one feed per tick, least recently fetched first.
///
/// A feed is marked fetched *before* its document is requested, so a feed
/// that keeps failing still rotates to the back of the queue instead of being
/// retried on every tick.
pub struct Scheduler {
    db: Database,
    client: FeedClient,
    interval: Duration,
}

impl Scheduler {
    /// Shortest polling interval accepted, to bound the outbound request rate.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

    /// Fails with [`ConfigError::IntervalTooShort`] below [`Self::MIN_INTERVAL`];
    /// the interval is never silently raised.
    pub fn new(db: Database, client: FeedClient, interval: Duration) -> Result<Self, ConfigError> {
        if interval < Self::MIN_INTERVAL {
            return Err(ConfigError::IntervalTooShort {
                interval,
                minimum: Self::MIN_INTERVAL,
            });
        }
        Ok(Self {
            db,
            client,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick at a fixed rate until `shutdown` is cancelled.
    ///
    /// The first tick fires immediately. Ticks run one at a time; if a tick
    /// overruns the interval the missed ticks are dropped rather than fired in
    /// a burst. Per-feed and per-item failures are logged and never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(interval = ?self.interval, "Collecting feeds");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(&shutdown).await {
                Ok(summary) => tracing::info!(
                    feed_id = summary.feed_id,
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Feed ingested"
                ),
                Err(TickError::NoFeeds) => {
                    tracing::debug!("No feeds registered, skipping tick");
                }
                Err(e @ TickError::Fetch { .. }) if e.is_transport() => {
                    tracing::warn!(error = %e, "Feed unreachable")
                }
                Err(e @ TickError::Fetch { .. }) => {
                    tracing::error!(error = %e, "Feed is not valid RSS")
                }
                Err(e) => tracing::warn!(error = %e, "Tick failed"),
            }
        }

        tracing::info!("Feed collection stopped");
    }

    /// Select, mark, fetch and persist one feed.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<IngestSummary, TickError> {
        let feed = self.db.next_feed_due().await.map_err(|e| match e {
            DatabaseError::NoFeeds => TickError::NoFeeds,
            other => TickError::Select(other),
        })?;

        tracing::info!(feed_id = feed.id, name = %feed.name, url = %feed.url, "Scraping feed");

        self.db
            .mark_fetched(feed.id)
            .await
            .map_err(|source| TickError::MarkFetched {
                feed_id: feed.id,
                source,
            })?;

        let document = self
            .client
            .fetch(&feed.url, cancel)
            .await
            .map_err(|source| TickError::Fetch {
                feed_id: feed.id,
                url: feed.url.clone(),
                source,
            })?;

        Ok(self.persist_items(&feed, &document.channel.items).await)
    }

    async fn persist_items(&self, feed: &Feed, items: &[RawFeedItem]) -> IngestSummary {
        let mut summary = IngestSummary {
            feed_id: feed.id,
            ..IngestSummary::default()
        };

        for item in items {
            let post = match normalize_item(feed.id, item) {
                Ok(post) => post,
                Err(e) => {
                    tracing::warn!(feed_id = feed.id, title = %item.title, error = %e, "Skipping item");
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.db.insert_post(&post).await {
                Ok(InsertOutcome::Inserted(stored)) => {
                    tracing::info!(feed = %feed.name, title = %stored.title, "New post");
                    summary.inserted += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    tracing::trace!(feed_id = feed.id, url = %post.url, "Already stored");
                    summary.duplicates += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        feed_id = feed.id,
                        title = %post.title,
                        error = %e,
                        "Failed to persist post"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
