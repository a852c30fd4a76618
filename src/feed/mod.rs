//! Fetching and decoding RSS documents.
//!
//! - [`client`] - one HTTP GET per call with timeout, size limit and cancellation
//! - [`parser`] - streaming RSS 2.0 reader built on `quick-xml`
//!
//! ```ignore
//! use gator::feed::FeedClient;
//!
//! let client = FeedClient::new("gator", Duration::from_secs(30))?;
//! let feed = client.fetch("https://blog.boot.dev/index.xml", &cancel).await?;
//! for item in &feed.channel.items {
//!     println!("{}", item.title);
//! }
//! ```

mod client;
mod parser;

pub use client::{FeedClient, FetchError};
pub use parser::{parse_feed, Channel, DecodeError, RawFeedItem, RssFeed};
