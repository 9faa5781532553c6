//! The lifecycle of a single capped request.
//!
//! A [`ScopedRequest`] is what [`CappedClient::get`](crate::CappedClient::get)
//! hands out. It is inert: no slot is taken and no I/O happens until it is
//! entered. [`ScopedRequest::enter`] waits for admission, opens the
//! connection and returns a [`ScopedResponse`], which owns both the slot and
//! the connection.
//!
//! The slot stays taken for as long as the connection is open. It is given
//! back right after the connection has been closed, which happens when
//!
//! - the body has been read to the end,
//! - reading the body failed,
//! - [`ScopedResponse::close`] was called, or
//! - the response was dropped, e.g. because the surrounding task was
//!   cancelled.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::gate::{AdmissionGate, Slot};
use crate::transport::{Connection, Transport};
use crate::{ErrorKind, RequestOptions, Result};

/// A GET request waiting to be entered
#[derive(Debug)]
#[must_use = "a scoped request does nothing until it is entered"]
pub struct ScopedRequest {
    gate: Arc<dyn AdmissionGate>,
    transport: Arc<dyn Transport>,
    url: Result<Url>,
    options: RequestOptions,
    admission_timeout: Option<Duration>,
}

impl ScopedRequest {
    pub(crate) fn new(
        gate: Arc<dyn AdmissionGate>,
        transport: Arc<dyn Transport>,
        url: Result<Url>,
        options: RequestOptions,
        admission_timeout: Option<Duration>,
    ) -> Self {
        Self {
            gate,
            transport,
            url,
            options,
            admission_timeout,
        }
    }

    /// The target URL, or `None` if it could not be parsed.
    /// The parse error is returned by [`ScopedRequest::enter`].
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref().ok()
    }

    /// Options the request will be sent with
    #[must_use]
    pub const fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Wait for a slot, then connect.
    ///
    /// Waiting for the slot is the only point where the connection limit
    /// makes the caller wait. Dropping the returned future while it waits
    /// takes no slot.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidUrl`] if the URL could not be parsed
    /// - [`ErrorKind::AdmissionTimeout`] if the client has an admission
    ///   timeout and no slot freed up in time
    /// - [`ErrorKind::Cancelled`] if the client was shut down
    /// - [`ErrorKind::Connect`] if the connection failed; the slot is
    ///   already released when this is returned
    pub async fn enter(self) -> Result<ScopedResponse> {
        let Self {
            gate,
            transport,
            url,
            options,
            admission_timeout,
        } = self;
        let url = url?;

        let slot = match admission_timeout {
            Some(limit) => tokio::time::timeout(limit, gate.acquire())
                .await
                .map_err(|_| ErrorKind::AdmissionTimeout(limit))??,
            None => gate.acquire().await?,
        };

        // The slot is released on drop if connecting fails
        let connection = transport.connect(&url, &options).await?;
        debug!("{url}: connected with status {}", connection.status());

        Ok(ScopedResponse::new(connection, slot))
    }

    /// Enter the request, run `f` on the response and close the scope,
    /// whatever `f` returned.
    ///
    /// ```no_run
    /// # use capped_lib::{CappedClient, Result};
    /// # #[tokio::main]
    /// # async fn main() -> Result<()> {
    /// let client = CappedClient::new(Some(4))?;
    /// let body = client
    ///     .get("https://example.com")
    ///     .scope(async |response| response.text().await)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ScopedRequest::enter`], then the error
    /// returned by `f`, then the error of closing the connection. Only the
    /// first of these is reported, the scope is closed in every case.
    pub async fn scope<F, T>(self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut ScopedResponse) -> Result<T>,
    {
        let mut response = self.enter().await?;
        let outcome = f(&mut response).await;
        let closed = response.close().await;
        let value = outcome?;
        closed?;
        Ok(value)
    }
}

/// Where an entered request stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Connection open, slot held
    Connected,
    /// Body read to the end, connection closed, slot released
    Completed,
    /// Reading or closing failed, connection closed, slot released
    Failed,
    /// Closed by the caller before the body ended, slot released
    Released,
}

/// An admitted, connected response.
///
/// Owns the admission slot and the connection until the scope ends.
#[derive(Debug)]
pub struct ScopedResponse {
    connection: Option<Box<dyn Connection>>,
    slot: Slot,
    state: ScopeState,
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    received: usize,
}

impl ScopedResponse {
    fn new(connection: Box<dyn Connection>, slot: Slot) -> Self {
        Self {
            status: connection.status(),
            headers: connection.headers().clone(),
            url: connection.url().clone(),
            connection: Some(connection),
            slot,
            state: ScopeState::Connected,
            received: 0,
        }
    }

    /// Response status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL of the response
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Current state of the scope
    #[must_use]
    pub const fn state(&self) -> ScopeState {
        self.state
    }

    /// Returns `true` once the connection is closed and the slot released
    #[must_use]
    pub const fn is_released(&self) -> bool {
        !self.slot.is_held()
    }

    /// Number of body bytes read so far
    #[must_use]
    pub const fn bytes_received(&self) -> usize {
        self.received
    }

    /// Read the next chunk of the body.
    ///
    /// Returns `Ok(None)` at the end of the body; at that point the
    /// connection has been closed and the slot released.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ReadBody`] if the body breaks off; the scope is closed
    ///   before the error is returned
    /// - [`ErrorKind::Close`] if closing after the last chunk failed
    /// - [`ErrorKind::ScopeClosed`] when reading from a scope that failed or
    ///   was closed early
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            ScopeState::Connected => {}
            ScopeState::Completed => return Ok(None),
            ScopeState::Failed | ScopeState::Released => return Err(ErrorKind::ScopeClosed),
        }
        let connection = self.connection.as_mut().ok_or(ErrorKind::ScopeClosed)?;

        let read = connection.chunk().await;
        match read {
            Ok(Some(chunk)) => {
                self.received += chunk.len();
                Ok(Some(chunk))
            }
            Ok(None) => {
                self.finish(ScopeState::Completed).await?;
                Ok(None)
            }
            Err(e) => {
                // The read error is what the caller needs to see,
                // a failing close on top of it is dropped
                let _ = self.finish(ScopeState::Failed).await;
                Err(e)
            }
        }
    }

    /// Read the rest of the body
    ///
    /// # Errors
    ///
    /// See [`ScopedResponse::chunk`].
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Read the rest of the body as UTF-8 text
    ///
    /// # Errors
    ///
    /// See [`ScopedResponse::chunk`]. Additionally returns
    /// [`ErrorKind::Utf8Error`] if the body is not valid UTF-8.
    pub async fn text(&mut self) -> Result<String> {
        let body = self.bytes().await?;
        Ok(std::str::from_utf8(&body)?.to_owned())
    }

    /// Close the connection and release the slot without reading the rest
    /// of the body. Does nothing if the scope has already ended.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Close`] if the transport fails to close the
    /// connection. The slot is released anyway.
    pub async fn close(&mut self) -> Result<()> {
        self.finish(ScopeState::Released).await
    }

    /// Close the connection, then release the slot.
    async fn finish(&mut self, outcome: ScopeState) -> Result<()> {
        if self.state != ScopeState::Connected {
            return Ok(());
        }

        let closed = match self.connection.as_mut() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        };
        self.connection = None;
        self.slot.release();

        // Only now, so a cancelled close leaves the scope `Connected`
        self.state = if closed.is_err() {
            ScopeState::Failed
        } else {
            outcome
        };
        trace!("{}: scope ended as {:?}", self.url, self.state);
        closed
    }
}

impl Drop for ScopedResponse {
    fn drop(&mut self) {
        if self.slot.is_held() {
            trace!("{}: scope abandoned, closing connection", self.url);
            drop(self.connection.take());
            self.slot.release();
        }
    }
}
