use std::future::Future;
use std::time::Duration;

use super::classification::ErrorClassification;
use super::types::VulnAgentError;
use tracing::warn;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl ErrorClassification {
    /// Delay before the retry that follows the given attempt (0-indexed).
    ///
    /// - RateLimitError: 30s + (attempt * 10s), capped at 120s
    /// - Default: `base * 2^attempt`, capped at 30s
    pub fn retry_delay(&self, attempt: u32, base: Duration) -> Duration {
        match self.error_type {
            "RateLimitError" => {
                let secs = 30 + (attempt as u64 * 10);
                Duration::from_secs(secs.min(120))
            }
            _ => {
                let factor = 2u32.saturating_pow(attempt);
                base.saturating_mul(factor).min(MAX_BACKOFF)
            }
        }
    }
}

/// Retry configuration shared by the transport and oracle calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Execute an async operation with exponential backoff.
///
/// Retries only if the error is classified as retryable and attempts remain.
/// The error of the final attempt is returned as-is.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, VulnAgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VulnAgentError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();

                if !classification.retryable {
                    warn!(
                        operation = operation_name,
                        error_type = classification.error_type,
                        "Non-retryable error, failing immediately"
                    );
                    return Err(e);
                }
                if attempt + 1 >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max = max_attempts,
                        "Max retries exhausted"
                    );
                    return Err(e);
                }

                let delay = classification.retry_delay(attempt, config.base_delay);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
