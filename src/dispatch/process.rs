//! Subprocess job dispatcher.
//!
//! Runs each job as a local child process with a bounded runtime. Used for
//! standalone runs where no job-controller service is available; the
//! container image hint is ignored because the job runs directly on the
//! host.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::{DispatchError, JobDispatcher, JobOutput, JobRequest};

/// Dispatcher executing jobs as local subprocesses
pub struct ProcessDispatcher {
    job_timeout: Duration,
}

impl Default for ProcessDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl ProcessDispatcher {
    /// Create a dispatcher with a per-job timeout
    pub fn new(job_timeout: Duration) -> Self {
        Self { job_timeout }
    }
}

#[async_trait]
impl JobDispatcher for ProcessDispatcher {
    fn name(&self) -> &str {
        "process"
    }

    async fn dispatch(&self, job: &JobRequest) -> Result<JobOutput, DispatchError> {
        let Some((program, args)) = job.command.split_first() else {
            return Err(DispatchError::MissingCommand {
                job_id: job.job_id.clone(),
            });
        };

        let child = Command::new(program)
            .args(args)
            .current_dir(&job.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = timeout(self.job_timeout, child.wait_with_output())
            .await
            .map_err(|_| DispatchError::Timeout {
                job_id: job.job_id.clone(),
                seconds: self.job_timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DispatchError::NonZeroExit {
                job_id: job.job_id.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(JobOutput {
            logs: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(dir: &TempDir, command: &[&str]) -> JobRequest {
        JobRequest {
            job_id: "#job".to_string(),
            name: "job".to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            image: None,
            workdir: dir.path().to_path_buf(),
            output_dir: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let dispatcher = ProcessDispatcher::default();

        let output = dispatcher
            .dispatch(&request(&dir, &["echo", "hello"]))
            .await
            .unwrap();

        assert_eq!(output.logs.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let dispatcher = ProcessDispatcher::default();

        let result = dispatcher.dispatch(&request(&dir, &["false"])).await;

        assert!(matches!(
            result,
            Err(DispatchError::NonZeroExit { code: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let dispatcher = ProcessDispatcher::default();

        let result = dispatcher
            .dispatch(&request(&dir, &["definitely-not-a-real-binary"]))
            .await;

        assert!(matches!(result, Err(DispatchError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dispatcher = ProcessDispatcher::default();

        let result = dispatcher.dispatch(&request(&dir, &[])).await;

        assert!(matches!(result, Err(DispatchError::MissingCommand { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_slow_jobs() {
        let dir = TempDir::new().unwrap();
        let dispatcher = ProcessDispatcher::new(Duration::from_millis(100));

        let result = dispatcher.dispatch(&request(&dir, &["sleep", "5"])).await;

        assert!(matches!(result, Err(DispatchError::Timeout { .. })));
    }
}
