mod json;
mod plain;

pub(crate) use json::Json;
pub(crate) use plain::Plain;

use crate::stats::FetchStats;
use anyhow::Result;

pub(crate) trait StatsFormatter {
    /// Format the stats of all fetched URLs
    fn format(&self, stats: &FetchStats) -> Result<String>;
}
