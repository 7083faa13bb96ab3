//! HTTP status transport.
//!
//! Delivers status events to the platform's status collector endpoint with
//! bounded exponential backoff, so transient collector outages do not lose
//! the terminal event.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Phase, StatusEvent, StatusMessage};

use super::{StatusTransport, TransportError};

/// Retry schedule for event delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRetry {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    10000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for DeliveryRetry {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl DeliveryRetry {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Status transport posting events to an HTTP collector
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
    retry: DeliveryRetry,
}

impl HttpTransport {
    /// Create a transport for a collector endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            retry: DeliveryRetry::default(),
        }
    }

    /// Override the retry schedule
    pub fn with_retry(mut self, retry: DeliveryRetry) -> Self {
        self.retry = retry;
        self
    }

    async fn post_once(&self, event: &StatusEvent) -> Result<(), TransportError> {
        let response = self.client.post(&self.endpoint).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl StatusTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(
        &self,
        run_id: &str,
        phase: Phase,
        logs: &str,
        message: Option<&StatusMessage>,
    ) -> Result<(), TransportError> {
        let event = StatusEvent::new(run_id, phase, logs, message.cloned());

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            match self.post_once(&event).await {
                Ok(()) => return Ok(()),
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        run_id,
                        phase = phase.code(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "status delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(TransportError::Exhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays() {
        let retry = DeliveryRetry {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(retry.delay_for_attempt(4), Duration::from_millis(8000));
        assert_eq!(retry.delay_for_attempt(5), Duration::from_millis(10000)); // Capped
    }

    #[test]
    fn test_retry_attempt_budget() {
        let retry = DeliveryRetry {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(retry.should_retry(1));
        assert!(retry.should_retry(2));
        assert!(!retry.should_retry(3));
    }

    #[test]
    fn test_transport_name() {
        let transport = HttpTransport::new("http://status.local/events");
        assert_eq!(transport.name(), "http");
    }
}
