//! SQLite persistence for users, feeds and posts.
//!
//! The ingestion engine relies on three operations here:
//! [`Database::next_feed_due`], [`Database::mark_fetched`] and
//! [`Database::insert_post`]. The rest is directory bookkeeping for the CLI.

mod feeds;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{DatabaseError, Feed, FeedListing, InsertOutcome, NewPost, Post, User};
