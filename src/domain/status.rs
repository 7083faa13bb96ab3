//! Status event wire contract.
//!
//! The shapes here are consumed by the platform's monitoring layer and must
//! be preserved bit-for-bit: phase codes are `1 = running`, `2 = succeeded`,
//! `3 = failed`, and the progress snapshot is four `{total, job_ids}`
//! buckets keyed `total` / `running` / `finished` / `failed`.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Coarse lifecycle phase of a run, reported as an integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The run is executing
    Running,

    /// The run finished and every job succeeded
    Succeeded,

    /// The run finished with a failure
    Failed,
}

impl Phase {
    /// The wire code for this phase
    pub fn code(&self) -> u8 {
        match self {
            Phase::Running => 1,
            Phase::Succeeded => 2,
            Phase::Failed => 3,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Phase::Running),
            2 => Some(Phase::Succeeded),
            3 => Some(Phase::Failed),
            _ => None,
        }
    }

    /// Whether this phase ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Phase::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown phase code {}", code)))
    }
}

/// One counter bucket of the progress snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBucket {
    /// Number of jobs in this bucket
    pub total: usize,

    /// Identifiers of the jobs in this bucket
    pub job_ids: Vec<String>,
}

impl JobBucket {
    /// A bucket holding a fixed count with no per-job identifiers
    pub fn fixed(total: usize) -> Self {
        Self {
            total,
            job_ids: Vec::new(),
        }
    }

    /// Add one job to the bucket
    pub fn push(&mut self, job_id: impl Into<String>) {
        self.total += 1;
        self.job_ids.push(job_id.into());
    }

    /// Remove one job from the bucket, returning whether it was present
    pub fn remove(&mut self, job_id: &str) -> bool {
        match self.job_ids.iter().position(|id| id == job_id) {
            Some(index) => {
                self.job_ids.remove(index);
                self.total = self.total.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Whether the bucket contains a job
    pub fn contains(&self, job_id: &str) -> bool {
        self.job_ids.iter().any(|id| id == job_id)
    }
}

/// The four-bucket job accounting snapshot carried by status events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: JobBucket,
    pub running: JobBucket,
    pub finished: JobBucket,
    pub failed: JobBucket,
}

/// Structured payload of a status event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusMessage {
    /// A progress snapshot (`{"progress": {...}}` on the wire)
    Progress { progress: Progress },

    /// A bare diagnostic string (terminal failures before accounting starts)
    Text(String),
}

impl StatusMessage {
    /// Wrap a progress snapshot
    pub fn progress(progress: Progress) -> Self {
        StatusMessage::Progress { progress }
    }
}

/// A discrete status event, ready for transmission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub run_id: String,
    pub phase: Phase,
    pub logs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<StatusMessage>,
}

impl StatusEvent {
    /// Assemble an event for transmission
    pub fn new(
        run_id: impl Into<String>,
        phase: Phase,
        logs: impl Into<String>,
        message: Option<StatusMessage>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            phase,
            logs: logs.into(),
            message,
        }
    }
}
