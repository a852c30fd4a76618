use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::parser::{parse_feed, DecodeError, RssFeed};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed document.
///
/// Everything except [`FetchError::Decode`] is a transport failure: the
/// document never arrived intact.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built or sent (bad URL, DNS, connection, TLS)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The caller's cancellation token fired mid-request
    #[error("Request cancelled")]
    Cancelled,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body arrived but is not an RSS document
    #[error("Failed to decode feed: {0}")]
    Decode(#[from] DecodeError),
}

impl FetchError {
    /// True for failures where no usable document was received.
    pub fn is_transport(&self) -> bool {
        !matches!(self, FetchError::Decode(_))
    }
}

/// HTTP client for RSS documents.
///
/// Performs exactly one GET per [`fetch`](FeedClient::fetch); retrying is the
/// scheduler's business (a failed feed simply waits for its next turn).
#[derive(Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl FeedClient {
    /// Build a client that identifies itself with `user_agent` and gives up on
    /// a request after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http, timeout })
    }

    /// Fetch and decode the feed at `url`.
    ///
    /// Returns [`FetchError::Cancelled`] as soon as `cancel` fires. The response
    /// is owned by this call and dropped on every return path, which releases
    /// the connection.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<RssFeed, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.fetch_document(url) => result,
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<RssFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let feed = parse_feed(&bytes)?;
        tracing::debug!(
            url = %url,
            title = %feed.channel.title,
            items = feed.channel.items.len(),
            "Feed decoded"
        );
        Ok(feed)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
