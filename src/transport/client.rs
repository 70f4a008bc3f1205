use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::rate_limiter::{FixedWindowLimiter, RateLimitConfig};
use super::whitelist::Whitelist;
use crate::errors::{with_retry, RetryConfig, VulnAgentError};
use crate::models::{HttpMethod, ProbeRequest, ProbeResponse};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Anything that can deliver a probe and return a normalized response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, VulnAgentError>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub whitelist: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff_base: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            timeout: Duration::from_millis(10_000),
            retries: 3,
            backoff_base: Duration::from_secs(1),
            user_agent: "VulnAgent/1.0".to_string(),
            max_redirects: 5,
        }
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    /// Network attempts, retries included.
    pub attempts: u64,
    pub succeeded: u64,
    /// Requests refused by the whitelist.
    pub rejected: u64,
    /// Requests held back by the rate limiter.
    pub throttled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    succeeded: AtomicU64,
    rejected: AtomicU64,
    throttled: AtomicU64,
}

pub struct GuardedTransport {
    client: reqwest::Client,
    whitelist: Arc<Whitelist>,
    limiter: FixedWindowLimiter,
    retry: RetryConfig,
    timeout: Duration,
    counters: Counters,
}

impl GuardedTransport {
    pub fn new(config: TransportConfig) -> Result<Self, VulnAgentError> {
        let whitelist = Arc::new(Whitelist::new(&config.whitelist)?);

        // Redirects are followed only while they stay inside the whitelist.
        let redirect_whitelist = whitelist.clone();
        let max_redirects = config.max_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                attempt.stop()
            } else if redirect_whitelist.allows(attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(policy)
            .cookie_store(true)
            .build()
            .map_err(|e| VulnAgentError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            whitelist,
            limiter: FixedWindowLimiter::new(config.rate_limit),
            retry: RetryConfig {
                max_retries: config.retries,
                base_delay: config.backoff_base,
            },
            timeout: config.timeout,
            counters: Counters::default(),
        })
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            throttled: self.counters.throttled.load(Ordering::Relaxed),
        }
    }

    async fn execute_once(
        &self,
        url: &Url,
        request: &ProbeRequest,
        headers: &HeaderMap,
    ) -> Result<ProbeResponse, VulnAgentError> {
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url.clone())
            .headers(headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let exchange = async {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();
            let final_url = response.url().to_string();

            let mut header_map: HashMap<String, String> = HashMap::with_capacity(response.headers().len());
            for (name, value) in response.headers() {
                let Ok(value) = value.to_str() else { continue };
                // `http` header names are already lower-case.
                header_map
                    .entry(name.as_str().to_string())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }

            let bytes = response.bytes().await.map_err(map_reqwest_error)?;
            let body = if bytes.len() > MAX_BODY_BYTES {
                String::from_utf8_lossy(&bytes[..MAX_BODY_BYTES]).into_owned()
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            };

            Ok::<_, VulnAgentError>(ProbeResponse {
                status,
                headers: header_map,
                body,
                url: final_url,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(VulnAgentError::Timeout(format!(
                "Request timeout after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl Transport for GuardedTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, VulnAgentError> {
        let url = match self.whitelist.check(&request.url) {
            Ok(url) => url,
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(url = %request.url, error = %e, "Request refused by transport guard");
                return Err(e);
            }
        };
        let headers = build_headers(&request.headers)?;

        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
        }

        debug!(method = %request.method, url = %url, "Sending probe");
        let response = with_retry("http_request", &self.retry, || {
            self.execute_once(&url, request, &headers)
        })
        .await?;

        self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        debug!(status = response.status, final_url = %response.url, "Probe completed");
        Ok(response)
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, VulnAgentError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| VulnAgentError::InvalidInput(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| VulnAgentError::InvalidInput(format!("header '{}' value: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn map_reqwest_error(e: reqwest::Error) -> VulnAgentError {
    if e.is_timeout() {
        VulnAgentError::Timeout(e.to_string())
    } else {
        VulnAgentError::Network(e.to_string())
    }
}
