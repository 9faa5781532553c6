//! `capped` is an HTTP client that never has more than a fixed number of
//! connections open at the same time.
//!
//! Every request has to be admitted before its connection is opened, and
//! gives its slot back only once the connection is closed again: after the
//! body was read, after an error, or when the response is dropped.
//!
//! ```no_run
//! use capped_lib::{CappedClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = CappedClient::new(Some(15))?;
//!     let urls = vec!["https://example.com"; 30];
//!
//!     // At most 15 connections are open at any time
//!     for fetched in client.fetch_all(&urls).await {
//!         let fetched = fetched?;
//!         println!("{} {} bytes", fetched.status, fetched.body.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For finer control, enter a [`ScopedRequest`] yourself.
//! The slot is held while the [`ScopedResponse`] is connected:
//!
//! ```no_run
//! use capped_lib::{CappedClient, Result};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let client = CappedClient::new(Some(2))?;
//! let request = client.get("https://example.com");
//!
//! let mut response = request.enter().await?;
//! assert_eq!(client.in_flight(), 1);
//!
//! let body = response.text().await?;
//! assert_eq!(client.in_flight(), 0);
//! # Ok(())
//! # }
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unused_extern_crates
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

mod client;
mod config;
mod request;
mod types;

pub mod gate;
pub mod transport;
#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::{
    client::{CappedClient, ClientBuilder, DEFAULT_USER_AGENT},
    config::CapConfig,
    gate::{AdmissionGate, Slot},
    request::{ScopeState, ScopedRequest, ScopedResponse},
    transport::{Connection, ReqwestTransport, Transport},
    types::*,
};
