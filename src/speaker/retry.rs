//! Retry with exponential backoff and jitter.
//!
//! Retries 429s, 5xx responses and network errors. A 429 also puts the
//! pacer into cooldown, which every later background request observes.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::pacing::Pacer;
use crate::config::RetryConfig;
use crate::error::AudioError;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

const DEFAULT_FACTOR: f64 = 2.5;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    factor: f64,
    jitter: Duration,
    cooldown: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig, cooldown: Duration) -> Self {
        let factor = if config.factor.is_finite() && config.factor >= 1.0 {
            config.factor
        } else {
            warn!("Invalid retry factor {}, using {DEFAULT_FACTOR}", config.factor);
            DEFAULT_FACTOR
        };

        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            factor,
            jitter: Duration::from_millis(config.jitter_ms),
            cooldown,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter. Capped at [`MAX_BACKOFF`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(extra)
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent.
    ///
    /// Background operations stop as soon as the pacer is cooling down.
    pub async fn execute<T, F, Fut>(
        &self,
        pacer: &Pacer,
        urgent: bool,
        mut operation: F,
    ) -> Result<T, AudioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AudioError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if matches!(err, AudioError::RateLimited) {
                pacer.enter_cooldown(self.cooldown);
            }

            if attempt >= self.max_attempts {
                warn!("Giving up after {attempt} attempts: {err}");
                return Err(AudioError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            if pacer.is_cooling_down(urgent) {
                debug!("Background request abandoned during cooldown: {err}");
                return Err(err);
            }

            let delay = self.jittered(attempt);
            warn!(
                "Attempt {attempt}/{} failed: {err}, retrying in {}ms",
                self.max_attempts,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
