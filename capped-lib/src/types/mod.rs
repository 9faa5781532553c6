#![allow(unreachable_pub)]

mod error;
mod fetched;
mod options;
mod stats;

pub use error::{BoxError, ErrorKind};
pub use fetched::Fetched;
pub use options::RequestOptions;
pub use stats::GateStats;

/// The capped `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
