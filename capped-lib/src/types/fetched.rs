use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// A response that was read to the end
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL of the response
    pub url: Url,
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// The full body
    pub body: Bytes,
    /// Time from issuing the request until the status arrived,
    /// including the wait for admission
    pub status_after: Duration,
    /// Time from issuing the request until the body was read
    /// and the connection closed
    pub completed_after: Duration,
}

impl Fetched {
    /// Time spent receiving the body
    #[must_use]
    pub fn transfer_time(&self) -> Duration {
        self.completed_after.saturating_sub(self.status_after)
    }

    /// The body as text, replacing invalid UTF-8
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
