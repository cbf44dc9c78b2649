//! Exponential backoff with jitter.
//!
//! Used for re-registering the pack with Flyte and for reconnecting the Slack
//! realtime socket. Platform calls made on behalf of commands are never
//! retried.

use std::future::Future;
use std::time::Duration;
use rand::Rng;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (`None` retries forever).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Some(3),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Default::default()
        }
    }

    /// Policy for long-lived connections: retry forever, 1s up to 60s.
    pub fn reconnect() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Calculate the delay for a given attempt number (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(32) as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            capped_delay * rand::thread_rng().gen_range(0.5..1.5)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts <= max)
    }
}

/// Run `operation` until it succeeds, `is_retryable` rejects the error, or
/// the policy gives up. Returns the last error on failure.
pub async fn with_retry<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if !is_retryable(&e) || !policy.allows(attempts) {
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempts - 1);
                tracing::warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
