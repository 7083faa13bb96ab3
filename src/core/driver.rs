//! Top-level run control flow.
//!
//! Sequences workspace preparation, progress tracking, engine invocation,
//! and status publication for one run, and converts every failure mode —
//! including a panicking engine — into a terminal failure status plus a
//! process-style outcome code. Nothing escapes the driver's boundary.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::DEFAULT_CONTAINER_IMAGE;
use crate::dispatch::JobDispatcher;
use crate::domain::{LogSeverity, Phase, RunOutcome, RunSpec, StatusMessage};
use crate::engine::{EngineContext, EngineHooks, WorkflowEngine};
use crate::transport::StatusTransport;

use super::adapter::RunAdapter;
use super::logs::LogCapture;
use super::progress::SharedProgress;
use super::publisher::StatusPublisher;
use super::workspace::Workspace;

/// Drives one workflow run to completion
pub struct RunDriver {
    engine: Arc<dyn WorkflowEngine>,
    dispatcher: Arc<dyn JobDispatcher>,
    transport: Arc<dyn StatusTransport>,
    default_image: String,
}

impl RunDriver {
    /// Assemble a driver from its collaborators
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        dispatcher: Arc<dyn JobDispatcher>,
        transport: Arc<dyn StatusTransport>,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            transport,
            default_image: DEFAULT_CONTAINER_IMAGE.to_string(),
        }
    }

    /// Override the default container image applied to jobs without one
    pub fn with_default_image(mut self, image: impl Into<String>) -> Self {
        self.default_image = image.into();
        self
    }

    /// Execute one run. Never returns an error: every failure path becomes
    /// a terminal failure status and a nonzero outcome code.
    #[instrument(skip(self, spec, storage_root, logs), fields(run_id = %spec.run_id))]
    pub async fn run(
        &self,
        spec: RunSpec,
        storage_root: &Path,
        logs: Arc<LogCapture>,
    ) -> RunOutcome {
        let publisher = Arc::new(StatusPublisher::new(
            spec.run_id.clone(),
            Arc::clone(&self.transport),
        ));

        // Workspace first: a setup failure ends the run before it starts
        let workspace = match Workspace::prepare(storage_root, &spec).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!(error = %e, "workspace preparation failed");
                publisher
                    .publish_terminal(Phase::Failed, "", Some(StatusMessage::Text(e.to_string())))
                    .await;
                return RunOutcome::failed(e.to_string());
            }
        };

        logs.bind(&workspace.paths.logs_dir);
        logs.record(LogSeverity::Info, "workspace prepared, starting the run");

        let total = spec.workflow.dispatchable_jobs();
        let progress = SharedProgress::new(total);

        let snapshot = match progress.start() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                publisher
                    .publish_terminal(Phase::Failed, "", Some(StatusMessage::Text(e.to_string())))
                    .await;
                return RunOutcome::failed(e.to_string());
            }
        };
        publisher.publish_started(snapshot).await;

        let hooks: Arc<dyn EngineHooks> = Arc::new(RunAdapter::new(
            progress.clone(),
            Arc::clone(&self.dispatcher),
            self.default_image.clone(),
        ));
        let ctx = Arc::new(EngineContext::new(
            spec.run_id.clone(),
            workspace.paths.clone(),
            Arc::clone(&publisher),
            Arc::clone(&logs),
            spec.options.clone(),
        ));

        // The engine runs as its own task so that a panic inside it surfaces
        // as a join error instead of unwinding past the terminal publish
        let engine = Arc::clone(&self.engine);
        let workflow = spec.workflow.clone();
        let inputs = spec.inputs.clone();
        let engine_ctx = Arc::clone(&ctx);
        let handle =
            tokio::spawn(async move { engine.run(workflow, inputs, hooks, engine_ctx).await });

        let error = match handle.await {
            Ok(Ok(outputs)) => {
                let failed = progress.snapshot().failed.total;
                if failed == 0 {
                    logs.record(LogSeverity::Info, "workflow done");
                    self.store_outputs(&workspace, &outputs).await;
                    None
                } else {
                    let reason = format!("engine returned with {} failed job(s)", failed);
                    logs.record(LogSeverity::Error, &reason);
                    Some(reason)
                }
            }
            Ok(Err(fault)) => {
                let reason = fault.to_string();
                logs.record(LogSeverity::Error, &format!("workflow failed: {}", reason));
                Some(reason)
            }
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    "engine panicked".to_string()
                } else {
                    join_error.to_string()
                };
                logs.record(LogSeverity::Error, &format!("workflow failed: {}", reason));
                Some(reason)
            }
        };

        // Single terminal path: runs on every exit from the engine
        let success = error.is_none();
        progress.complete(success);
        let phase = if success {
            Phase::Succeeded
        } else {
            Phase::Failed
        };
        publisher
            .publish_terminal(
                phase,
                &logs.tail(),
                Some(StatusMessage::progress(progress.snapshot())),
            )
            .await;

        // Workspace lock is held until the terminal event is out
        drop(workspace);

        match error {
            None => {
                info!("run succeeded");
                RunOutcome::ok()
            }
            Some(reason) => {
                error!(error = %reason, "run failed");
                RunOutcome::failed(reason)
            }
        }
    }

    async fn store_outputs(&self, workspace: &Workspace, outputs: &serde_json::Value) {
        let path = workspace.paths.outputs_dir.join("outputs.json");
        let bytes = match serde_json::to_vec_pretty(outputs) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "could not serialize outputs");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&path, bytes).await {
            warn!(path = %path.display(), error = %e, "could not store outputs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ProcessDispatcher;
    use crate::engine::LinearEngine;
    use crate::transport::InMemoryTransport;

    #[test]
    fn test_driver_assembly() {
        let driver = RunDriver::new(
            Arc::new(LinearEngine::new()),
            Arc::new(ProcessDispatcher::default()),
            Arc::new(InMemoryTransport::new()),
        )
        .with_default_image("busybox:stable");

        assert_eq!(driver.default_image, "busybox:stable");
    }
}
