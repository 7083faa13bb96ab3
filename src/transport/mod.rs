//! Transport abstraction for status delivery.
//!
//! The orchestrator publishes status events through a single-capability
//! transport; the wire protocol behind it (message broker, HTTP collector)
//! belongs to the platform. Transports are expected to provide at-least-once
//! delivery to their backing channel or surface a `TransportError`; the run
//! itself never fails on delivery problems.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::{Phase, StatusMessage};

// Re-export the concrete transports
pub use http::{DeliveryRetry, HttpTransport};
pub use memory::{FailingTransport, InMemoryTransport, SentStatus};

/// Errors raised by a status transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status endpoint rejected event: {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery not confirmed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("status serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Capability for delivering status events to the platform
#[async_trait]
pub trait StatusTransport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Deliver one status event
    async fn send(
        &self,
        run_id: &str,
        phase: Phase,
        logs: &str,
        message: Option<&StatusMessage>,
    ) -> Result<(), TransportError>;
}

/// Transport that reports status events on the local log stream.
///
/// Used when no platform status endpoint is configured, so standalone runs
/// still surface their lifecycle.
#[derive(Debug, Default)]
pub struct LoggingTransport;

impl LoggingTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatusTransport for LoggingTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(
        &self,
        run_id: &str,
        phase: Phase,
        logs: &str,
        message: Option<&StatusMessage>,
    ) -> Result<(), TransportError> {
        let message = match message {
            Some(m) => serde_json::to_string(m)?,
            None => String::new(),
        };

        info!(
            run_id,
            phase = phase.code(),
            %message,
            log_bytes = logs.len(),
            "workflow status"
        );

        Ok(())
    }
}
