//! In-memory transports used as test doubles.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Phase, StatusMessage};

use super::{StatusTransport, TransportError};

/// A status event as observed by the in-memory transport
#[derive(Debug, Clone)]
pub struct SentStatus {
    pub run_id: String,
    pub phase: Phase,
    pub logs: String,
    /// Serialized message payload, for shape assertions
    pub message: Option<Value>,
}

/// Transport that records every event it is handed
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    sent: Mutex<Vec<SentStatus>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, in order
    pub fn sent(&self) -> Vec<SentStatus> {
        self.sent.lock().expect("transport lock poisoned").clone()
    }

    /// Just the phase codes, in order
    pub fn phases(&self) -> Vec<u8> {
        self.sent().iter().map(|s| s.phase.code()).collect()
    }
}

#[async_trait]
impl StatusTransport for InMemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(
        &self,
        run_id: &str,
        phase: Phase,
        logs: &str,
        message: Option<&StatusMessage>,
    ) -> Result<(), TransportError> {
        let message = match message {
            Some(m) => Some(serde_json::to_value(m)?),
            None => None,
        };

        self.sent
            .lock()
            .expect("transport lock poisoned")
            .push(SentStatus {
                run_id: run_id.to_string(),
                phase,
                logs: logs.to_string(),
                message,
            });

        Ok(())
    }
}

/// Transport that refuses every delivery, for error-path tests
#[derive(Debug, Default)]
pub struct FailingTransport {
    attempts: Mutex<u32>,
}

impl FailingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many deliveries were attempted
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().expect("transport lock poisoned")
    }
}

#[async_trait]
impl StatusTransport for FailingTransport {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send(
        &self,
        _run_id: &str,
        _phase: Phase,
        _logs: &str,
        _message: Option<&StatusMessage>,
    ) -> Result<(), TransportError> {
        *self.attempts.lock().expect("transport lock poisoned") += 1;
        Err(TransportError::Unavailable("scripted outage".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_records_in_order() {
        let transport = InMemoryTransport::new();

        transport.send("run-1", Phase::Running, "", None).await.unwrap();
        transport
            .send("run-1", Phase::Succeeded, "done", None)
            .await
            .unwrap();

        assert_eq!(transport.phases(), vec![1, 2]);
        assert_eq!(transport.sent()[1].logs, "done");
    }

    #[tokio::test]
    async fn test_failing_transport_counts_attempts() {
        let transport = FailingTransport::new();

        let result = transport.send("run-1", Phase::Running, "", None).await;
        assert!(result.is_err());
        assert_eq!(transport.attempts(), 1);
    }
}
