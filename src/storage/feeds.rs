use super::schema::{now_millis, Database};
use super::types::{DatabaseError, Feed, FeedListing};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

impl Database {
    // ========================================================================
    // Feed Directory
    // ========================================================================

    /// Register a feed owned by `user_id`. URLs are unique across all users.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = now_millis();
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if DatabaseError::is_unique_violation(&e) {
                DatabaseError::FeedExists(url.to_string())
            } else {
                DatabaseError::Other(e)
            }
        })
    }

    pub async fn feed_by_id(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::FeedNotFound(feed_id))
    }

    pub async fn feed_by_url(&self, url: &str) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::FeedUrlNotFound(url.to_string()))
    }

    /// All feeds with the name of the user who added them, ordered by feed name
    pub async fn feeds_with_owners(&self) -> Result<Vec<FeedListing>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT f.name, f.url, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name, f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// The feed polled least recently.
    ///
    /// Never-fetched feeds come first; ties are broken by ascending id so
    /// successive calls walk every feed before any repeats.
    pub async fn next_feed_due(&self) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NoFeeds)
    }

    /// Stamp a feed as fetched now.
    ///
    /// The stamp is strictly greater than every existing `last_fetched_at`, so
    /// a feed marked in the same millisecond as another still moves behind it.
    pub async fn mark_fetched(&self, feed_id: i64) -> Result<(), DatabaseError> {
        let now = now_millis();
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(?1, COALESCE((SELECT MAX(last_fetched_at) FROM feeds), 0) + 1),
                updated_at = ?1
            WHERE id = ?2
        "#,
        )
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::FeedNotFound(feed_id));
        }
        Ok(())
    }
}
