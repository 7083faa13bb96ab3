//! skein - workflow run orchestrator
//!
//! Drives a single workflow run to completion on behalf of a cluster-based
//! job orchestration platform. Graph execution is delegated to an external
//! engine behind a small hook interface; skein owns everything around that
//! delegation:
//! - an isolated workspace with the frozen workflow and inputs
//! - job accounting (total / running / finished / failed)
//! - status events published through a transport abstraction
//! - run-tagged log capture
//! - a guaranteed terminal status on every exit path
//!
//! # Modules
//!
//! - `domain`: data model (workflow document, run spec, status wire contract)
//! - `core`: orchestration logic (workspace, progress, publisher, logs, driver)
//! - `engine`: the engine/hook interfaces and the default linear engine
//! - `dispatch`: job execution backends (subprocess, job-controller)
//! - `transport`: status delivery backends (HTTP, in-memory, log)
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a workflow
//! skein run --run-id 42 --workflow-file workflow.json --parameters '{"n": 3}'
//!
//! # Inspect resolved configuration
//! skein config
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod transport;

// Re-export main types at crate root for convenience
pub use crate::core::{
    LogCapture, ProgressTracker, ProtocolViolation, RunDriver, RunPhase, SharedProgress,
    StatusPublisher, Workspace, WorkspaceError,
};
pub use crate::domain::{
    JobBucket, LogRecord, LogSeverity, Phase, Progress, RunOptions, RunOutcome, RunSpec,
    StatusEvent, StatusMessage, WorkflowDocument,
};
pub use crate::engine::{EngineContext, EngineFault, EngineHooks, LinearEngine, WorkflowEngine};
