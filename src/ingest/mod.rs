//! The ingestion engine: turns registered feeds into stored posts.
//!
//! Each [`Scheduler`] tick picks the least recently fetched feed, marks it
//! fetched, downloads it, runs every item through [`normalize_item`] and
//! inserts the result. Re-polling is idempotent because the store reports
//! already-seen `(feed, link)` pairs as duplicates instead of failing.

mod normalize;
mod scheduler;

pub use normalize::{normalize_item, parse_pub_date, TimestampParseError};
pub use scheduler::{IngestSummary, Scheduler, TickError};
