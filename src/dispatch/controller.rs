//! Job-controller dispatcher.
//!
//! Submits each job to the platform's job-controller service over HTTP and
//! polls it to completion. The controller owns container placement and
//! scheduling; this client only observes the job's lifecycle.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use super::{DispatchError, JobDispatcher, JobOutput, JobRequest};

/// Job submission payload
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    job_id: &'a str,
    docker_img: &'a str,
    cmd: &'a [String],
    workflow_workspace: String,
}

/// Response from job submission
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Response from a job status poll
#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    logs: Option<String>,
}

/// Dispatcher delegating execution to the job-controller service
pub struct ControllerDispatcher {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl ControllerDispatcher {
    /// Create a client for a controller host
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("http://{}", host)
        };

        Self {
            base_url,
            client: reqwest::Client::new(),
            poll_interval: Duration::from_secs(2),
            job_timeout: Duration::from_secs(3600),
        }
    }

    /// Override the status poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the overall per-job deadline
    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    fn jobs_url(&self) -> String {
        format!("{}/jobs", self.base_url)
    }

    async fn submit(&self, job: &JobRequest) -> Result<String, DispatchError> {
        let payload = SubmitRequest {
            job_id: &job.job_id,
            docker_img: job.image.as_deref().unwrap_or_default(),
            cmd: &job.command,
            workflow_workspace: job.workdir.display().to_string(),
        };

        let response = self
            .client
            .post(self.jobs_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let submitted: SubmitResponse = response.json().await?;
        Ok(submitted.job_id)
    }

    async fn poll(&self, controller_id: &str) -> Result<JobStatusResponse, DispatchError> {
        let url = format!("{}/{}", self.jobs_url(), controller_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl JobDispatcher for ControllerDispatcher {
    fn name(&self) -> &str {
        "controller"
    }

    async fn dispatch(&self, job: &JobRequest) -> Result<JobOutput, DispatchError> {
        if job.command.is_empty() {
            return Err(DispatchError::MissingCommand {
                job_id: job.job_id.clone(),
            });
        }

        let controller_id = self.submit(job).await?;
        debug!(job_id = %job.job_id, controller_id = %controller_id, "job submitted");

        let deadline = tokio::time::Instant::now() + self.job_timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(DispatchError::Timeout {
                    job_id: job.job_id.clone(),
                    seconds: self.job_timeout.as_secs(),
                });
            }

            let polled = self.poll(&controller_id).await?;
            match polled.status.as_str() {
                "succeeded" | "finished" => {
                    return Ok(JobOutput {
                        logs: polled.logs.unwrap_or_default(),
                    });
                }
                "failed" => {
                    return Err(DispatchError::ControllerFailed {
                        job_id: job.job_id.clone(),
                        logs: polled.logs.unwrap_or_default(),
                    });
                }
                _ => sleep(self.poll_interval).await,
            }
        }
    }
}
