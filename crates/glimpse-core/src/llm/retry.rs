//! Retry policy for caption requests.
//!
//! Transient failures (timeouts, rate limits, 5xx, refused connections) are
//! retried with exponential backoff; everything else fails immediately.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DefaultsConfig;
use crate::error::PipelineError;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 30_000;

/// How many times to try, how long to wait between tries, and how long each
/// try may take.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub base_delay_ms: u64,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_defaults(defaults: &DefaultsConfig, timeout: Duration) -> Self {
        Self {
            retries: defaults.retry_attempts,
            base_delay_ms: defaults.retry_delay_ms,
            timeout,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of retries.
    ///
    /// `label` names the image in timeout errors and logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    path: PathBuf::from(label),
                    stage: "caption".to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    let delay = backoff_duration(attempt, self.base_delay_ms);
                    tracing::warn!(
                        "Caption attempt {} for {label} failed: {e}. Retrying in {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether an error is worth retrying.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Llm {
            status_code: Some(code),
            ..
        }
        | PipelineError::Fetch {
            status_code: Some(code),
            ..
        } => *code == 429 || (500..=599).contains(code),
        // No status: a transport failure rather than an HTTP answer.
        PipelineError::Llm {
            message,
            status_code: None,
        }
        | PipelineError::Fetch {
            message,
            status_code: None,
            ..
        } => message.contains("timed out") || message.contains("connect"),
        _ => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}
