//! The HTTP engine behind a [`CappedClient`](crate::CappedClient).
//!
//! The client itself only decides *when* a connection may be opened.
//! Opening it, sending the request and streaming the response is the job of a
//! [`Transport`]. [`ReqwestTransport`] is the default implementation.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt::Debug;
use url::Url;

use crate::{ErrorKind, RequestOptions, Result};

/// Opens connections for GET requests
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Connect to `url` and send a GET request, returning as soon as the
    /// status line and headers are in.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Connect`] if no response could be obtained.
    /// HTTP error statuses are not errors.
    async fn connect(&self, url: &Url, options: &RequestOptions) -> Result<Box<dyn Connection>>;
}

/// An open connection with a response waiting to be read
#[async_trait]
pub trait Connection: Debug + Send {
    /// Response status
    fn status(&self) -> StatusCode;

    /// Response headers
    fn headers(&self) -> &HeaderMap;

    /// Final URL of the response, after redirects
    fn url(&self) -> &Url;

    /// Next piece of the body, `None` once the body is complete.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReadBody`] if the body stream breaks off.
    async fn chunk(&mut self) -> Result<Option<Bytes>>;

    /// Tear the connection down. Calling this more than once is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Close`] if the transport reports a failure
    /// while closing.
    async fn close(&mut self) -> Result<()>;
}

/// [`Transport`] backed by a [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an already configured `reqwest` client.
    ///
    /// The client should not keep idle connections around
    /// (see [`reqwest::ClientBuilder::pool_max_idle_per_host`]),
    /// otherwise a released slot may still correspond to an open socket.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// A transport with a plain client that closes every connection after use
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::BuildRequestClient`] if the TLS backend cannot be
    /// initialized.
    pub fn try_default() -> Result<Self> {
        let client = Self::client_builder()
            .build()
            .map_err(ErrorKind::BuildRequestClient)?;
        Ok(Self::new(client))
    }

    /// A `reqwest` builder with connection reuse switched off
    #[must_use]
    pub fn client_builder() -> reqwest::ClientBuilder {
        reqwest::ClientBuilder::new().pool_max_idle_per_host(0)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn connect(&self, url: &Url, options: &RequestOptions) -> Result<Box<dyn Connection>> {
        let mut request = self
            .client
            .get(url.clone())
            .headers(options.headers.clone());
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| ErrorKind::Connect {
            url: url.clone(),
            source: Box::new(e),
        })?;

        Ok(Box::new(ReqwestConnection {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            response: Some(response),
        }))
    }
}

/// A response streamed by `reqwest`.
///
/// Dropping the inner [`reqwest::Response`] closes the socket, since the
/// transport keeps no idle connections.
#[derive(Debug)]
struct ReqwestConnection {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    response: Option<reqwest::Response>,
}

#[async_trait]
impl Connection for ReqwestConnection {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn url(&self) -> &Url {
        &self.url
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        response.chunk().await.map_err(|e| ErrorKind::ReadBody {
            url: self.url.clone(),
            source: Box::new(e),
        })
    }

    async fn close(&mut self) -> Result<()> {
        drop(self.response.take());
        Ok(())
    }
}
