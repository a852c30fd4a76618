use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::feed::RawFeedItem;
use crate::storage::NewPost;

/// Everything after the weekday in `Mon, 02 Jan 2006 15:04:05 +0000`.
const PUB_DATE_LAYOUT: &str = "%d %b %Y %H:%M:%S +0000";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A `pubDate` that does not follow the RFC-822 style layout with a `+0000` offset.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid publish date {input:?}: {reason}")]
pub struct TimestampParseError {
    pub input: String,
    reason: String,
}

impl TimestampParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parses `"<Wkd>, <DD> <Mon> <YYYY> <hh>:<mm>:<ss> +0000"` as a UTC instant.
///
/// The weekday must be a valid abbreviation but is not checked against the
/// date; publishers get it wrong often enough that rejecting the item over it
/// would lose real posts.
pub fn parse_pub_date(input: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let trimmed = input.trim();
    let (weekday, rest) = trimmed
        .split_once(", ")
        .ok_or_else(|| TimestampParseError::new(input, "missing weekday"))?;

    if !WEEKDAYS.contains(&weekday) {
        return Err(TimestampParseError::new(
            input,
            format!("unknown weekday {:?}", weekday),
        ));
    }

    NaiveDateTime::parse_from_str(rest, PUB_DATE_LAYOUT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TimestampParseError::new(input, e.to_string()))
}

/// Turns a wire item into a post ready for [`Database::insert_post`](crate::storage::Database::insert_post).
///
/// Title and link lose surrounding whitespace only. Every post is dated: an
/// item whose `pubDate` is missing or unparseable is rejected.
pub fn normalize_item(feed_id: i64, item: &RawFeedItem) -> Result<NewPost, TimestampParseError> {
    let pub_date = item
        .pub_date
        .as_deref()
        .ok_or_else(|| TimestampParseError::new("", "missing pubDate"))?;
    let published_at = Some(parse_pub_date(pub_date)?.timestamp_millis());

    Ok(NewPost {
        feed_id,
        title: item.title.trim().to_string(),
        url: item.link.trim().to_string(),
        description: item.description.clone(),
        published_at,
    })
}
