use super::schema::{now_millis, Database};
use super::types::{DatabaseError, InsertOutcome, NewPost, Post};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post unless its `(feed_id, url)` pair is already stored.
    ///
    /// Re-ingesting an item yields [`InsertOutcome::Duplicate`] rather than an
    /// error; the existing row is left untouched. Each call is its own atomic
    /// statement, so a failure here never leaves a partial batch behind.
    pub async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, DatabaseError> {
        let now = now_millis();
        let inserted = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, url) DO NOTHING
            RETURNING id, feed_id, title, url, description, published_at, created_at, updated_at
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(post) => InsertOutcome::Inserted(post),
            None => InsertOutcome::Duplicate,
        })
    }

    /// Posts for a feed, newest publication first (undated posts last)
    pub async fn posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC NULLS LAST, id ASC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn post_count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
