//! Log records captured during a run.
//!
//! Every record is tagged with the owning run identifier and appended to the
//! run's durable log store as one JSON line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a captured log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// One captured log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// The run this record belongs to
    pub run_id: String,

    /// Severity of the line
    pub severity: LogSeverity,

    /// The message text
    pub message: String,

    /// When the line was captured
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Create a record stamped with the current time
    pub fn new(run_id: impl Into<String>, severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
