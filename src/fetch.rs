//! Resilient HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP with the manners of one: persistent cookies, a
//! stable Chrome identity, bounded redirects, retry with jittered backoff on
//! transient failures, and a politeness delay between hits to the same host.
//!
//! One `FetchClient` lives for the duration of one `AcquisitionRequest`;
//! concurrent requests each own their jar and politeness timer.

use crate::config::PortalConfig;
use crate::error::AcquireError;
use crate::model::RawPayload;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";

/// Redirect hop limit; exceeding it is a permanent failure.
const REDIRECT_LIMIT: usize = 5;

/// HTTP client scoped to one acquisition request.
pub struct FetchClient {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base_ms: u64,
    politeness_delay: Duration,
    /// Last request instant per host, for the politeness budget.
    last_hit: Mutex<HashMap<String, Instant>>,
    cancel: CancellationToken,
}

impl FetchClient {
    pub fn new(cfg: &PortalConfig, cancel: CancellationToken) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .expect("valid header"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "es-CL,es;q=0.9,en;q=0.5".parse().expect("valid header"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries: cfg.max_retries,
            backoff_base_ms: cfg.backoff_base_ms,
            politeness_delay: Duration::from_millis(cfg.politeness_delay_ms),
            last_hit: Mutex::new(HashMap::new()),
            cancel: cancel.clone(),
        }
    }

    /// GET a URL, retrying transient failures with exponential backoff.
    ///
    /// Returns the raw bytes plus delivery metadata. Permanent failures
    /// (4xx, malformed URL, redirect limit) are returned immediately.
    pub async fn fetch(&self, url: &str) -> Result<RawPayload, AcquireError> {
        let parsed = url::Url::parse(url).map_err(|e| AcquireError::Permanent {
            url: url.to_string(),
            reason: format!("malformed URL: {e}"),
        })?;
        let host = parsed.host_str().unwrap_or("").to_string();

        self.respect_politeness(&host).await?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(url, attempt, "GET");

            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status >= 500 || status == 429 {
                        let reason = format!("HTTP {status}");
                        if attempt <= self.max_retries {
                            warn!(url, status, attempt, "transient status, backing off");
                            self.backoff(attempt).await?;
                            continue;
                        }
                        return Err(AcquireError::Transient {
                            url: url.to_string(),
                            reason,
                        });
                    }

                    if status >= 400 {
                        return Err(AcquireError::Permanent {
                            url: url.to_string(),
                            reason: format!("HTTP {status}"),
                        });
                    }

                    let content_type = resp
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());
                    let final_url = resp.url().to_string();
                    let bytes = resp.bytes().await.map_err(|e| AcquireError::Transient {
                        url: url.to_string(),
                        reason: format!("body read failed: {e}"),
                    })?;

                    return Ok(RawPayload {
                        bytes: bytes.to_vec(),
                        content_type,
                        encoding: None,
                        url: final_url,
                        status,
                    });
                }
                Err(e) => {
                    if e.is_redirect() {
                        return Err(AcquireError::Permanent {
                            url: url.to_string(),
                            reason: "redirect limit exceeded".into(),
                        });
                    }
                    if e.is_builder() {
                        return Err(AcquireError::Permanent {
                            url: url.to_string(),
                            reason: format!("request build failed: {e}"),
                        });
                    }
                    // Timeout, connect reset, and protocol hiccups all retry.
                    if attempt <= self.max_retries {
                        warn!(url, attempt, error = %e, "transient error, backing off");
                        self.backoff(attempt).await?;
                        continue;
                    }
                    return Err(AcquireError::Transient {
                        url: url.to_string(),
                        reason: format!("{e}"),
                    });
                }
            }
        }
    }

    /// Enforce the minimum inter-request delay to one host. Independent of
    /// retry backoff.
    async fn respect_politeness(&self, host: &str) -> Result<(), AcquireError> {
        if self.politeness_delay.is_zero() {
            return Ok(());
        }
        let wait = {
            let map = self.last_hit.lock().await;
            map.get(host).and_then(|last| {
                self.politeness_delay
                    .checked_sub(Instant::now().duration_since(*last))
            })
        };
        if let Some(wait) = wait {
            debug!(host, wait_ms = wait.as_millis() as u64, "politeness delay");
            self.sleep_or_cancel(wait).await?;
        }
        self.last_hit
            .lock()
            .await
            .insert(host.to_string(), Instant::now());
        Ok(())
    }

    /// Exponential backoff with random jitter up to 25% of the interval.
    async fn backoff(&self, attempt: u32) -> Result<(), AcquireError> {
        let base = self.backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(6));
        let jitter = rand::thread_rng().gen_range(0..=base / 4);
        self.sleep_or_cancel(Duration::from_millis(base + jitter))
            .await
    }

    async fn sleep_or_cancel(&self, d: Duration) -> Result<(), AcquireError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AcquireError::Cancelled),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }
}
