use anyhow::Result;
use std::fmt::{self, Display};

use super::StatsFormatter;
use crate::stats::{FetchResult, FetchStats};

struct PlainResult<'a>(&'a FetchResult);

impl Display for PlainResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        match (&result.error, result.status) {
            (Some(error), _) => write!(f, "[ERROR] {} | {error}", result.url),
            (None, Some(status)) => {
                write!(f, "[{status}] {}", result.url)?;
                if let Some(bytes) = result.bytes {
                    write!(f, " | {bytes} bytes")?;
                }
                if let (Some(status_secs), Some(completed_secs)) =
                    (result.status_secs, result.completed_secs)
                {
                    write!(f, ", status after {status_secs:.2}s, done after {completed_secs:.2}s")?;
                }
                Ok(())
            }
            (None, None) => write!(f, "[?] {}", result.url),
        }
    }
}

struct PlainFetchStats<'a>(&'a FetchStats);

impl Display for PlainFetchStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        for result in &stats.results {
            writeln!(f, "{}", PlainResult(result))?;
        }
        if !stats.results.is_empty() {
            writeln!(f)?;
        }

        writeln!(
            f,
            "{} Total, {} OK, {} Failed",
            stats.total, stats.successful, stats.failed
        )?;
        match stats.limit {
            Some(limit) => write!(f, "Peak {} of {limit} connections", stats.peak)?,
            None => write!(f, "Peak {} connections (no limit)", stats.peak)?,
        }
        write!(f, " in {:.2}s", stats.duration_secs)
    }
}

pub(crate) struct Plain;

impl Plain {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl StatsFormatter for Plain {
    fn format(&self, stats: &FetchStats) -> Result<String> {
        Ok(PlainFetchStats(stats).to_string())
    }
}
