//! Status publisher bridge.
//!
//! Serializes progress snapshots and terminal outcomes into status events
//! and hands them to the injected transport. The bridge owns the per-run
//! event-stream guarantees: one started event, zero or more progress
//! events, and exactly one terminal event no matter how the run ends.
//! Delivery failures are logged and never escalate to fail the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::domain::{Phase, Progress, StatusMessage};
use crate::transport::StatusTransport;

/// Per-run bridge in front of a status transport
pub struct StatusPublisher {
    run_id: String,
    transport: Arc<dyn StatusTransport>,
    started_sent: AtomicBool,
    terminal_sent: AtomicBool,
}

impl StatusPublisher {
    /// Create the bridge for one run
    pub fn new(run_id: impl Into<String>, transport: Arc<dyn StatusTransport>) -> Self {
        Self {
            run_id: run_id.into(),
            transport,
            started_sent: AtomicBool::new(false),
            terminal_sent: AtomicBool::new(false),
        }
    }

    /// The run this bridge publishes for
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Whether the terminal event has gone out
    pub fn terminal_published(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }

    /// Publish the run's single started event (phase 1)
    pub async fn publish_started(&self, progress: Progress) {
        if self.started_sent.swap(true, Ordering::SeqCst) {
            warn!(run_id = %self.run_id, "duplicate started event suppressed");
            return;
        }

        self.deliver(Phase::Running, "", Some(StatusMessage::progress(progress)))
            .await;
    }

    /// Publish an intermediate progress snapshot (phase 1)
    pub async fn publish_progress(&self, progress: Progress) {
        if self.terminal_sent.load(Ordering::SeqCst) {
            warn!(run_id = %self.run_id, "progress event after terminal suppressed");
            return;
        }

        self.deliver(Phase::Running, "", Some(StatusMessage::progress(progress)))
            .await;
    }

    /// Publish the run's single terminal event (phase 2 or 3).
    ///
    /// First call wins; later calls are dropped with a warning so duplicate
    /// terminal signals cannot reach the platform.
    pub async fn publish_terminal(&self, phase: Phase, logs: &str, message: Option<StatusMessage>) {
        debug_assert!(phase.is_terminal());

        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            warn!(run_id = %self.run_id, phase = phase.code(), "duplicate terminal event suppressed");
            return;
        }

        self.deliver(phase, logs, message).await;
    }

    async fn deliver(&self, phase: Phase, logs: &str, message: Option<StatusMessage>) {
        if let Err(e) = self
            .transport
            .send(&self.run_id, phase, logs, message.as_ref())
            .await
        {
            // Status delivery is best-effort from the run's perspective
            warn!(
                run_id = %self.run_id,
                phase = phase.code(),
                transport = self.transport.name(),
                error = %e,
                "status delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobBucket;
    use crate::transport::{FailingTransport, InMemoryTransport};

    fn progress(total: usize) -> Progress {
        Progress {
            total: JobBucket::fixed(total),
            ..Progress::default()
        }
    }

    #[tokio::test]
    async fn test_started_event_is_sent_once() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = StatusPublisher::new("run-1", transport.clone());

        publisher.publish_started(progress(2)).await;
        publisher.publish_started(progress(2)).await;

        assert_eq!(transport.phases(), vec![1]);
    }

    #[tokio::test]
    async fn test_terminal_event_first_wins() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = StatusPublisher::new("run-1", transport.clone());

        publisher
            .publish_terminal(Phase::Failed, "boom", None)
            .await;
        publisher
            .publish_terminal(Phase::Succeeded, "", None)
            .await;

        assert_eq!(transport.phases(), vec![3]);
        assert!(publisher.terminal_published());
    }

    #[tokio::test]
    async fn test_progress_after_terminal_is_suppressed() {
        let transport = Arc::new(InMemoryTransport::new());
        let publisher = StatusPublisher::new("run-1", transport.clone());

        publisher.publish_started(progress(1)).await;
        publisher
            .publish_terminal(Phase::Succeeded, "", None)
            .await;
        publisher.publish_progress(progress(1)).await;

        assert_eq!(transport.phases(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_propagate() {
        let transport = Arc::new(FailingTransport::new());
        let publisher = StatusPublisher::new("run-1", transport.clone());

        // Neither call may panic or error outward
        publisher.publish_started(progress(1)).await;
        publisher.publish_terminal(Phase::Failed, "", None).await;

        assert_eq!(transport.attempts(), 2);
    }
}
