use std::time::Instant;

use capped_lib::CappedClient;
use log::{debug, info};

use crate::stats::{FetchResult, FetchStats};

/// Fetch all `urls` through `client` and collect the outcome
pub(crate) async fn fetch(client: &CappedClient, urls: &[String]) -> FetchStats {
    info!(
        "Fetching {} URL(s), {}",
        urls.len(),
        client.limit().map_or_else(
            || "without a connection limit".to_string(),
            |limit| format!("at most {limit} at a time")
        )
    );

    let start = Instant::now();
    let results = client.fetch_all(urls).await;

    let mut stats = FetchStats::new();
    for (url, result) in urls.iter().zip(&results) {
        if let Err(e) = result {
            debug!("Failed to fetch {url}: {e}");
        }
        stats.add(FetchResult::new(url, result));
    }
    stats.finish(&client.stats(), start.elapsed());
    debug!("Done: {}", client.stats());
    stats
}
