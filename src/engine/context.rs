//! Run-scoped context shared with every hook invocation.

use std::sync::Arc;

use crate::core::logs::LogCapture;
use crate::core::publisher::StatusPublisher;
use crate::core::workspace::WorkspacePaths;
use crate::domain::RunOptions;

/// Read-mostly bag of references carried into every engine hook call.
///
/// One context exists per run and is never shared across runs; mutable run
/// state (the job counters) is reached through the publisher and the
/// adapter's tracker, never through fields here.
#[derive(Clone)]
pub struct EngineContext {
    /// The run this context belongs to
    pub run_id: String,

    /// Resolved workspace paths for the run
    pub paths: WorkspacePaths,

    /// Status publisher bridge for progress snapshots
    pub publisher: Arc<StatusPublisher>,

    /// Log capture handle for run-tagged records
    pub logs: Arc<LogCapture>,

    /// Operational options supplied with the run
    pub options: RunOptions,
}

impl EngineContext {
    /// Assemble the context for one run
    pub fn new(
        run_id: impl Into<String>,
        paths: WorkspacePaths,
        publisher: Arc<StatusPublisher>,
        logs: Arc<LogCapture>,
        options: RunOptions,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            paths,
            publisher,
            logs,
            options,
        }
    }
}
