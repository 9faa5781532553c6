//! The capped HTTP client.
//!
//! This module defines two structs, [`CappedClient`] and [`ClientBuilder`].
//! `CappedClient` hands out [`ScopedRequest`]s that share one admission gate,
//! so that no more than the configured number of connections is ever open
//! at once. `ClientBuilder` exposes a finer level of granularity for building
//! a `CappedClient`.
#![allow(clippy::module_name_repetitions)]
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use http::header::{self, HeaderMap, HeaderValue};
use log::debug;
use typed_builder::TypedBuilder;
use url::Url;

use crate::{
    ErrorKind, Fetched, GateStats, RequestOptions, Result,
    gate::{AdmissionGate, gate_for},
    request::ScopedRequest,
    transport::{ReqwestTransport, Transport},
};

/// Default user agent, `capped-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("capped/", env!("CARGO_PKG_VERSION"));

/// Builder for [`CappedClient`].
///
/// ```
/// use capped_lib::ClientBuilder;
/// use std::time::Duration;
///
/// # fn main() -> capped_lib::Result<()> {
/// let client = ClientBuilder::builder()
///     .max_concurrency(Some(15))
///     .timeout(Duration::from_secs(10))
///     .build()
///     .client()?;
/// assert_eq!(client.limit(), Some(15));
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// Maximum number of simultaneously open connections.
    ///
    /// `None` or `Some(0)` means no limit.
    max_concurrency: Option<usize>,
    /// Total timeout per request, from connecting until the body has been
    /// read.
    timeout: Option<Duration>,
    /// How long a request may wait for a free connection slot before it
    /// gives up with [`ErrorKind::AdmissionTimeout`].
    ///
    /// Waits forever if unset.
    admission_timeout: Option<Duration>,
    /// User-agent sent with every request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,
    /// Headers sent with every request.
    custom_headers: HeaderMap,
    /// When `true`, accept invalid TLS certificates.
    ///
    /// ## Warning
    ///
    /// Any certificate for any site will be trusted, including expired
    /// ones. Only use this for testing.
    allow_insecure: bool,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`CappedClient`] backed by `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<CappedClient> {
        let reqwest_client = ReqwestTransport::client_builder()
            .danger_accept_invalid_certs(self.allow_insecure)
            .build()
            .map_err(ErrorKind::BuildRequestClient)?;

        self.client_with_transport(ReqwestTransport::new(reqwest_client))
    }

    /// Instantiates a [`CappedClient`] that sends its requests through
    /// `transport`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the user-agent is not a valid header value.
    pub fn client_with_transport<T: Transport + 'static>(self, transport: T) -> Result<CappedClient> {
        let Self {
            max_concurrency,
            timeout,
            admission_timeout,
            user_agent,
            custom_headers: mut headers,
            ..
        } = self;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(ErrorKind::InvalidHeader)?,
        );

        let default_options = RequestOptions::builder()
            .headers(headers)
            .timeout(timeout)
            .build();

        Ok(CappedClient::with_transport(max_concurrency, transport)
            .admission_timeout(admission_timeout)
            .default_options(default_options))
    }
}

/// An HTTP client that never has more than a fixed number of connections
/// open.
///
/// Clones share the same limit.
///
/// ```no_run
/// use capped_lib::{CappedClient, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let client = CappedClient::new(Some(15))?;
///     let mut response = client.get("https://example.com").enter().await?;
///     println!("{}: {}", response.status(), response.text().await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CappedClient {
    gate: Arc<dyn AdmissionGate>,
    transport: Arc<dyn Transport>,
    admission_timeout: Option<Duration>,
    default_options: RequestOptions,
}

impl CappedClient {
    /// Create a client with the default configuration and the given limit.
    /// `None` or `Some(0)` means no limit.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::client`].
    pub fn new(limit: Option<usize>) -> Result<Self> {
        ClientBuilder::builder()
            .max_concurrency(limit)
            .build()
            .client()
    }

    /// Create a client that sends its requests through `transport`
    pub fn with_transport<T: Transport + 'static>(limit: Option<usize>, transport: T) -> Self {
        let gate = gate_for(limit);
        debug!(
            "Created client, connection limit: {}",
            gate.limit()
                .map_or_else(|| "none".to_string(), |limit| limit.to_string())
        );
        Self {
            gate,
            transport: Arc::new(transport),
            admission_timeout: None,
            default_options: RequestOptions::default(),
        }
    }

    /// Give up waiting for a connection slot after `admission_timeout`
    #[must_use]
    pub fn admission_timeout(mut self, admission_timeout: Option<Duration>) -> Self {
        self.admission_timeout = admission_timeout;
        self
    }

    /// Options applied to every request, unless the request overrides them
    #[must_use]
    pub fn default_options(mut self, default_options: RequestOptions) -> Self {
        self.default_options = default_options;
        self
    }

    /// Prepare a GET request.
    ///
    /// Nothing happens until the returned request is entered.
    pub fn get<U: AsRef<str>>(&self, url: U) -> ScopedRequest {
        self.get_with(url, &RequestOptions::default())
    }

    /// Prepare a GET request with extra options
    pub fn get_with<U: AsRef<str>>(&self, url: U, options: &RequestOptions) -> ScopedRequest {
        let url = url.as_ref();
        let parsed = Url::parse(url).map_err(|e| ErrorKind::InvalidUrl(url.to_string(), e));
        ScopedRequest::new(
            self.gate.clone(),
            self.transport.clone(),
            parsed,
            options.merged_with(&self.default_options),
            self.admission_timeout,
        )
    }

    /// Issue a GET request and read the whole response.
    ///
    /// # Errors
    ///
    /// See [`ScopedRequest::enter`] and
    /// [`ScopedResponse::bytes`](crate::ScopedResponse::bytes).
    pub async fn fetch<U: AsRef<str>>(&self, url: U) -> Result<Fetched> {
        let start = Instant::now();
        let mut response = self.get(url).enter().await?;
        let status_after = start.elapsed();
        let body = response.bytes().await?;

        Ok(Fetched {
            url: response.url().clone(),
            status: response.status(),
            headers: response.headers().clone(),
            body,
            status_after,
            completed_after: start.elapsed(),
        })
    }

    /// Fetch all `urls` concurrently, at most [`CappedClient::limit`] at a
    /// time. Results are in the order of `urls`.
    pub async fn fetch_all<I, U>(&self, urls: I) -> Vec<Result<Fetched>>
    where
        I: IntoIterator<Item = U>,
        U: AsRef<str>,
    {
        join_all(urls.into_iter().map(|url| self.fetch(url))).await
    }

    /// The admission gate shared by all requests of this client
    #[must_use]
    pub fn gate(&self) -> Arc<dyn AdmissionGate> {
        self.gate.clone()
    }

    /// Maximum number of simultaneously open connections, `None` if unbounded
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.gate.limit()
    }

    /// Number of connections open right now
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Occupancy of the connection limit
    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// Start recording the peak anew
    pub fn reset_peak(&self) {
        self.gate.reset_peak();
    }

    /// Stop admitting requests.
    ///
    /// Requests waiting for a slot, and all requests entered afterwards,
    /// fail with [`ErrorKind::Cancelled`]. Responses that are already open
    /// are not affected.
    pub fn shutdown(&self) {
        debug!("Shutting down, {} connection(s) still open", self.in_flight());
        self.gate.close();
    }

    /// Returns `true` after [`CappedClient::shutdown`]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.gate.is_closed()
    }
}
