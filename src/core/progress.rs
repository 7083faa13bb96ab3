//! Job accounting for one run.
//!
//! The tracker owns the four counter buckets and the run's lifecycle phase.
//! Counter invariants are enforced, not repaired: a breach means the engine
//! adapter and the engine have diverged on job accounting, and it is
//! reported as a `ProtocolViolation` so tests can catch adapter bugs.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::domain::{JobBucket, Progress};

/// Lifecycle phase of the run being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initialized,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    /// Whether the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// A breach of the job-accounting protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("'{action}' is not legal in phase {phase:?}")]
    IllegalTransition { action: &'static str, phase: RunPhase },

    #[error("job '{job_id}' started twice")]
    DuplicateStart { job_id: String },

    #[error("job '{job_id}' finished without having started")]
    UnknownJob { job_id: String },

    #[error("job '{job_id}' exceeds the fixed total of {total}")]
    CounterOverflow { job_id: String, total: usize },
}

/// In-memory state machine for one run's job counters
#[derive(Debug)]
pub struct ProgressTracker {
    phase: RunPhase,
    total: JobBucket,
    running: JobBucket,
    finished: JobBucket,
    failed: JobBucket,
}

impl ProgressTracker {
    /// Create a tracker with the fixed job total for the run
    pub fn new(total_jobs: usize) -> Self {
        Self {
            phase: RunPhase::Initialized,
            total: JobBucket::fixed(total_jobs),
            running: JobBucket::default(),
            finished: JobBucket::default(),
            failed: JobBucket::default(),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Snapshot of the four buckets
    pub fn snapshot(&self) -> Progress {
        Progress {
            total: self.total.clone(),
            running: self.running.clone(),
            finished: self.finished.clone(),
            failed: self.failed.clone(),
        }
    }

    /// Begin the run; emits the first progress snapshot
    pub fn start(&mut self) -> Result<Progress, ProtocolViolation> {
        if self.phase != RunPhase::Initialized {
            return Err(ProtocolViolation::IllegalTransition {
                action: "start",
                phase: self.phase,
            });
        }

        self.phase = RunPhase::Running;
        Ok(self.snapshot())
    }

    /// Record a job entering execution
    pub fn job_started(&mut self, job_id: &str) -> Result<Progress, ProtocolViolation> {
        if self.phase != RunPhase::Running {
            return Err(ProtocolViolation::IllegalTransition {
                action: "job_started",
                phase: self.phase,
            });
        }

        if self.running.contains(job_id)
            || self.finished.contains(job_id)
            || self.failed.contains(job_id)
        {
            return Err(ProtocolViolation::DuplicateStart {
                job_id: job_id.to_string(),
            });
        }

        let accounted = self.running.total + self.finished.total + self.failed.total;
        if accounted >= self.total.total {
            return Err(ProtocolViolation::CounterOverflow {
                job_id: job_id.to_string(),
                total: self.total.total,
            });
        }

        self.running.push(job_id);
        Ok(self.snapshot())
    }

    /// Record a job leaving execution
    pub fn job_finished(
        &mut self,
        job_id: &str,
        success: bool,
    ) -> Result<Progress, ProtocolViolation> {
        if self.phase != RunPhase::Running {
            return Err(ProtocolViolation::IllegalTransition {
                action: "job_finished",
                phase: self.phase,
            });
        }

        if !self.running.remove(job_id) {
            return Err(ProtocolViolation::UnknownJob {
                job_id: job_id.to_string(),
            });
        }

        if success {
            self.finished.push(job_id);
        } else {
            self.failed.push(job_id);
        }

        Ok(self.snapshot())
    }

    /// End the run. Idempotent: a second call is a no-op, tolerating
    /// duplicate terminal signals from the engine.
    pub fn complete(&mut self, success: bool) -> RunPhase {
        if !self.phase.is_terminal() {
            self.phase = if success {
                RunPhase::Succeeded
            } else {
                RunPhase::Failed
            };
        }

        self.phase
    }
}

/// Shared handle serializing all tracker mutation for a run.
///
/// The engine may dispatch jobs concurrently; every observation is funneled
/// through this mutex so the counter invariants hold under interleaving.
#[derive(Debug, Clone)]
pub struct SharedProgress(Arc<Mutex<ProgressTracker>>);

impl SharedProgress {
    pub fn new(total_jobs: usize) -> Self {
        Self(Arc::new(Mutex::new(ProgressTracker::new(total_jobs))))
    }

    fn with<T>(&self, f: impl FnOnce(&mut ProgressTracker) -> T) -> T {
        let mut tracker = self.0.lock().expect("progress tracker lock poisoned");
        f(&mut tracker)
    }

    pub fn start(&self) -> Result<Progress, ProtocolViolation> {
        self.with(|t| t.start())
    }

    pub fn job_started(&self, job_id: &str) -> Result<Progress, ProtocolViolation> {
        self.with(|t| t.job_started(job_id))
    }

    pub fn job_finished(&self, job_id: &str, success: bool) -> Result<Progress, ProtocolViolation> {
        self.with(|t| t.job_finished(job_id, success))
    }

    pub fn complete(&self, success: bool) -> RunPhase {
        self.with(|t| t.complete(success))
    }

    pub fn phase(&self) -> RunPhase {
        self.with(|t| t.phase())
    }

    pub fn snapshot(&self) -> Progress {
        self.with(|t| t.snapshot())
    }
}
