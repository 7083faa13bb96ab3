//! Run description and outcome.
//!
//! A `RunSpec` is created at driver entry and is immutable for the rest of
//! the run; the driver answers with a process-style `RunOutcome`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::workflow::WorkflowDocument;

/// Everything needed to execute one workflow run
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Opaque run identifier, supplied by the platform
    pub run_id: String,

    /// Name of the workspace directory under the shared storage root
    pub workspace: String,

    /// Frozen workflow document
    pub workflow: WorkflowDocument,

    /// Frozen resolved inputs
    pub inputs: Value,

    /// Free-form operational options
    pub options: RunOptions,
}

/// Free-form key/value options passed alongside a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunOptions {
    values: HashMap<String, Value>,
}

impl RunOptions {
    /// Parse options from a JSON object
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Look up a raw option value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set an option (mainly useful in tests)
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Whether per-job progress snapshots should be published
    pub fn report_progress(&self) -> bool {
        self.get("report_progress")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Per-job timeout override in seconds
    pub fn job_timeout_seconds(&self) -> Option<u64> {
        self.get("job_timeout_seconds").and_then(Value::as_u64)
    }
}

/// Process-style result of a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code: 0 on success, nonzero on any failure path
    pub code: i32,

    /// Failure description, when the run did not succeed
    pub error: Option<String>,
}

impl RunOutcome {
    /// A successful run
    pub fn ok() -> Self {
        Self {
            code: 0,
            error: None,
        }
    }

    /// A failed run with a diagnostic
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            code: 1,
            error: Some(error.into()),
        }
    }

    /// Whether the run succeeded
    pub fn success(&self) -> bool {
        self.code == 0
    }
}
