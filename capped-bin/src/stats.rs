use std::time::Duration;

use capped_lib::{ErrorKind, Fetched, GateStats};
use serde::Serialize;

/// Outcome of fetching a single URL
#[derive(Debug, Serialize)]
pub(crate) struct FetchResult {
    pub(crate) url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bytes: Option<usize>,
    /// Seconds until the status arrived, including the wait for admission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status_secs: Option<f64>,
    /// Seconds until the body was read and the connection closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) completed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl FetchResult {
    pub(crate) fn new(url: &str, result: &Result<Fetched, ErrorKind>) -> Self {
        match result {
            Ok(fetched) => Self {
                url: url.to_string(),
                status: Some(fetched.status.as_u16()),
                bytes: Some(fetched.body.len()),
                status_secs: Some(fetched.status_after.as_secs_f64()),
                completed_secs: Some(fetched.completed_after.as_secs_f64()),
                error: None,
            },
            Err(e) => Self {
                url: url.to_string(),
                status: None,
                bytes: None,
                status_secs: None,
                completed_secs: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub(crate) const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything `capped` reports after a run
#[derive(Debug, Default, Serialize)]
pub(crate) struct FetchStats {
    pub(crate) total: usize,
    pub(crate) successful: usize,
    pub(crate) failed: usize,
    /// Connection limit, absent when unbounded
    pub(crate) limit: Option<usize>,
    /// Most connections that were open at once
    pub(crate) peak: usize,
    pub(crate) duration_secs: f64,
    pub(crate) results: Vec<FetchResult>,
}

impl FetchStats {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, result: FetchResult) {
        self.total += 1;
        if result.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Record the occupancy of the connection limit at the end of the run
    pub(crate) fn finish(&mut self, gate: &GateStats, duration: Duration) {
        self.limit = gate.limit;
        self.peak = gate.peak;
        self.duration_secs = duration.as_secs_f64();
    }

    #[inline]
    pub(crate) const fn is_success(&self) -> bool {
        self.failed == 0
    }
}
