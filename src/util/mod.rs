//! Small parsing helpers used by the command line.

mod duration;
mod feed_url;

pub use duration::{parse_duration, DurationParseError};
pub use feed_url::{validate_feed_url, FeedUrlError};
