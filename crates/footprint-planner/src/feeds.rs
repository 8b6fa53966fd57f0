//! Fetch 3-line element text from remote feeds

use chrono::Utc;
use orbital_elements::{parse_feed, OrbitalElementRecord};
use serde::Serialize;
use tracing::{info, warn};

/// Records gathered from a set of feed URLs
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedFetch {
    pub records: Vec<OrbitalElementRecord>,
    /// URLs that could not be fetched or answered with an error status
    pub failed_sites: Vec<String>,
    pub rejected_lines: usize,
    pub sites_fetched: usize,
}

impl FeedFetch {
    pub fn all_failed(&self) -> bool {
        self.sites_fetched == 0 && !self.failed_sites.is_empty()
    }
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("status {}", status));
    }
    response.text().await.map_err(|e| e.to_string())
}

/// Fetch every URL in order and scan each body for element groups.
///
/// A failing site is recorded and skipped; the remaining sites still load.
pub async fn fetch_feeds(client: &reqwest::Client, urls: &[String]) -> FeedFetch {
    let mut fetch = FeedFetch::default();

    for url in urls {
        let text = match fetch_text(client, url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Element feed {} failed: {}", url, e);
                fetch.failed_sites.push(url.clone());
                continue;
            }
        };

        let scan = parse_feed(&text, Utc::now());
        info!(
            "Element feed {}: {} records, {} lines rejected",
            url,
            scan.records.len(),
            scan.rejected_lines
        );
        fetch.sites_fetched += 1;
        fetch.rejected_lines += scan.rejected_lines;
        fetch.records.extend(scan.records);
    }

    fetch
}
