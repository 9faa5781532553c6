use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Boxed error returned by a [`Transport`](crate::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Possible errors when issuing requests through a `CappedClient`
///
/// Every error is returned with cleanup already performed: by the time the
/// caller sees it, the connection is closed and the admission slot is free.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse {0} as a URL: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    /// The connection could not be established (DNS, refused, timeout)
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        /// The URL that was requested
        url: Url,
        /// The underlying transport error
        #[source]
        source: BoxError,
    },

    /// The response body could not be read to completion
    #[error("Failed to read response body from {url}: {source}")]
    ReadBody {
        /// The URL the response came from
        url: Url,
        /// The underlying transport error
        #[source]
        source: BoxError,
    },

    /// Closing the connection reported an error
    #[error("Failed to close connection to {url}: {source}")]
    Close {
        /// The URL of the closed connection
        url: Url,
        /// The underlying transport error
        #[source]
        source: BoxError,
    },

    /// The admission gate was shut down while the request waited for a slot
    #[error("Request was cancelled while waiting for a connection slot")]
    Cancelled,

    /// No connection slot became available in time
    #[error("No connection slot became available within {}ms", .0.as_millis())]
    AdmissionTimeout(Duration),

    /// The response was read after its scope had already been released.
    /// This is a bug in the calling code.
    #[error("Response scope was already released")]
    ScopeClosed,

    /// The response body is not valid UTF-8
    #[error("Attempted to interpret an invalid sequence of bytes as a string")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// The given header value could not be parsed
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The given header name could not be parsed
    #[error("Header name could not be parsed.")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// The underlying `reqwest` client could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),
}

impl ErrorKind {
    /// The URL this error relates to, if any
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        match self {
            Self::Connect { url, .. } | Self::ReadBody { url, .. } | Self::Close { url, .. } => {
                Some(url)
            }
            _ => None,
        }
    }

    /// Returns `true` if the error happened before a connection was open,
    /// i.e. no request reached the server.
    #[must_use]
    pub const fn is_admission(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(..) | Self::Cancelled | Self::AdmissionTimeout(_)
        )
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<(String, url::ParseError)> for ErrorKind {
    fn from(value: (String, url::ParseError)) -> Self {
        Self::InvalidUrl(value.0, value.1)
    }
}
