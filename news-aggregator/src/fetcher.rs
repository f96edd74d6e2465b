use crate::types::{AggregatorError, FetchConfig, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

/// Shared HTTP client for the news providers: timeouts, retries with
/// exponential backoff and per-host request spacing.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// GET `url` and return the body text, retrying transient failures.
    ///
    /// `label` names the caller in logs and errors; query strings are never
    /// logged since they carry API keys.
    pub async fn fetch_text(&self, label: &str, url: &Url) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching {} from {}{}", label, url.host_str().unwrap_or(""), url.path());

        self.apply_rate_limit(url).await;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        if let Some(content_length) = response.content_length() {
                            let size_mb = content_length as usize / (1024 * 1024);
                            if size_mb > self.config.max_response_size_mb {
                                return Err(AggregatorError::ProviderUnavailable {
                                    provider: label.to_string(),
                                    reason: format!("response too large: {}MB", size_mb),
                                });
                            }
                        }

                        let body = response.text().await.map_err(|e| AggregatorError::Http(e.without_url()))?;
                        info!(
                            "Fetched {} ({} bytes in {}ms)",
                            label,
                            body.len(),
                            start_time.elapsed().as_millis()
                        );
                        return Ok(body);
                    }

                    last_error = Some(AggregatorError::ProviderUnavailable {
                        provider: label.to_string(),
                        reason: format!("HTTP {}: {}", status, status.canonical_reason().unwrap_or("Unknown")),
                    });

                    if !is_retryable_status(status) {
                        break;
                    }
                }
                Err(e) => {
                    // the URL carries the API key
                    last_error = Some(AggregatorError::Http(e.without_url()));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, label, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        error!("Failed to fetch {} after {}ms", label, start_time.elapsed().as_millis());
        Err(last_error.unwrap_or_else(|| AggregatorError::ProviderUnavailable {
            provider: label.to_string(),
            reason: "unknown error".to_string(),
        }))
    }

    async fn apply_rate_limit(&self, url: &Url) {
        let host = url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_host_interval_ms);

        // Reserve the next slot for this host, then sleep without holding the lock
        let wait_time = {
            let mut rate_limiter = self.rate_limiter.write().await;
            let now = Instant::now();
            let slot = match rate_limiter.get(&host) {
                Some(last_request) => (*last_request + min_interval).max(now),
                None => now,
            };
            rate_limiter.insert(host.clone(), slot);
            slot - now
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
