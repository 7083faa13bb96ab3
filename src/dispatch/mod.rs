//! Job dispatch interfaces.
//!
//! Dispatchers carry a single assembled job to wherever it actually executes:
//! a local subprocess for standalone runs, or the platform's job-controller
//! service for cluster runs. The engine adapter routes every job through this
//! seam and never executes anything itself.

pub mod controller;
pub mod process;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

// Re-export the concrete dispatchers
pub use controller::ControllerDispatcher;
pub use process::ProcessDispatcher;

/// A fully assembled job, ready to dispatch
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Graph node identifier, used for accounting
    pub job_id: String,

    /// Short display name
    pub name: String,

    /// Command line to execute
    pub command: Vec<String>,

    /// Container image for the job, when one applies
    pub image: Option<String>,

    /// Working directory for intermediate data
    pub workdir: PathBuf,

    /// Directory the job writes its outputs to
    pub output_dir: PathBuf,
}

/// What a completed job hands back
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    /// Captured job log (stdout or controller-side log)
    pub logs: String,
}

/// Errors raised while dispatching a job
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job '{job_id}' has no command to execute")]
    MissingCommand { job_id: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("job '{job_id}' timed out after {seconds}s")]
    Timeout { job_id: String, seconds: u64 },

    #[error("job '{job_id}' exited with code {code}: {stderr}")]
    NonZeroExit {
        job_id: String,
        code: i32,
        stderr: String,
    },

    #[error("job-controller request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("job-controller rejected request: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("job '{job_id}' failed on the controller: {logs}")]
    ControllerFailed { job_id: String, logs: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability for executing one assembled job
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Human-readable dispatcher name
    fn name(&self) -> &str;

    /// Execute the job to completion
    async fn dispatch(&self, job: &JobRequest) -> Result<JobOutput, DispatchError>;
}
