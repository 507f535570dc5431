pub mod asn;
pub mod ntsb;

pub use asn::AsnListing;
pub use ntsb::NtsbApi;

use crate::constants;
use crate::error::{Result, ScraperError};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetch knobs shared by both adapters, taken from the scraper config
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchOptions {
    pub timeout: Duration,
    pub retry_count: u32,
    pub delay_ms: u64,
}

impl FetchOptions {
    pub fn from_config(config: &crate::config::ScraperConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            retry_count: config.retry_count,
            delay_ms: config.delay_ms,
        }
    }
}

/// GET with the project User-Agent, an explicit timeout, and bounded retry
/// with linear backoff on transient failures (5xx, timeout). 4xx and other
/// non-2xx statuses fail immediately.
pub(crate) async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    options: FetchOptions,
) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match send_once(client, url, query, options.timeout).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt <= options.retry_count => {
                warn!(
                    "Transient fetch failure for {} (attempt {}/{}): {}",
                    url, attempt, options.retry_count, e
                );
                let backoff = Duration::from_millis(options.delay_ms * u64::from(attempt));
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
) -> Result<String> {
    debug!("GET {}", url);
    let response = client
        .get(url)
        .query(query)
        .header(reqwest::header::USER_AGENT, constants::USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::Network {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response.text().await?)
}
