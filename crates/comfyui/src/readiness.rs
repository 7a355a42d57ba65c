//! Exponential-backoff readiness probe for a freshly launched ComfyUI
//! server.
//!
//! [`wait_until_ready`] polls `GET /system_stats` with increasing delays
//! until the server answers, the attempt budget runs out, or the
//! [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::ComfyUIApi;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second probe.
    pub initial_delay: Duration,
    /// Upper bound on the delay between probes.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Probes to make before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 20,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("ComfyUI at {url} not ready after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },

    #[error("Readiness wait cancelled")]
    Cancelled,
}

/// Poll the server until `/system_stats` succeeds.
pub async fn wait_until_ready(
    api: &ComfyUIApi,
    config: &BackoffConfig,
    cancel: &CancellationToken,
) -> Result<(), ReadinessError> {
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(url = api.api_url(), "Readiness wait cancelled");
                return Err(ReadinessError::Cancelled);
            }
            result = api.system_stats() => {
                match result {
                    Ok(_) => {
                        tracing::info!(url = api.api_url(), attempt, "ComfyUI is ready");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(
                            url = api.api_url(),
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Readiness probe {attempt} failed",
                        );
                    }
                }
            }
        }

        if attempt == config.max_attempts {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }

    tracing::warn!(url = api.api_url(), attempts = config.max_attempts, "ComfyUI never became ready");
    Err(ReadinessError::Exhausted {
        url: api.api_url().to_string(),
        attempts: config.max_attempts,
    })
}
