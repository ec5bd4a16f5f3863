use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::parser::{self, Harvest};

pub const DEFAULT_SOURCE_URL: &str = "https://en.wikipedia.org/wiki/List_of_Nike_missile_sites";
const USER_AGENT: &str = concat!("nike_sites/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub url: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_millis(2000),
        }
    }
}

/// The page could not be retrieved. Distinct from a page with zero matching rows.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("GET {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: StatusCode,
        attempts: u32,
    },
}

/// Fetch the source page and run the harvester over it.
pub async fn fetch_and_harvest(config: &FetchConfig) -> Result<Harvest, FetchError> {
    let html = fetch_document(config).await?;
    Ok(parser::harvest(&html, &config.url))
}

/// GET the page body, retrying transport errors, 429 and 5xx with exponential backoff.
pub async fn fetch_document(config: &FetchConfig) -> Result<String, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(FetchError::Client)?;

    info!("Fetching data from {}", config.url);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let failure = match fetch_once(&client, &config.url).await {
            Ok(body) => return Ok(body),
            Err(Attempt::Transport(source)) => FetchError::Transport {
                url: config.url.clone(),
                attempts: attempt,
                source,
            },
            Err(Attempt::Status(status)) => {
                let err = FetchError::Status {
                    url: config.url.clone(),
                    status,
                    attempts: attempt,
                };
                if !is_retryable(status) {
                    return Err(err);
                }
                err
            }
        };

        if attempt > config.max_retries {
            return Err(failure);
        }
        let backoff = backoff_delay(config.base_backoff, attempt);
        warn!(
            "{} (attempt {}/{}), backing off {:.1}s",
            failure,
            attempt,
            config.max_retries.saturating_add(1),
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
}

enum Attempt {
    Transport(reqwest::Error),
    Status(StatusCode),
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<String, Attempt> {
    let response = client.get(url).send().await.map_err(Attempt::Transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(Attempt::Status(status));
    }
    response.text().await.map_err(Attempt::Transport)
}

/// `base * 2^(attempt-1)`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
