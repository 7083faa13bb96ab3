//! Command-line interface for skein.
//!
//! The platform invokes one process per run: the `run` command executes a
//! workflow to completion and exits with the driver's coded outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::core::{LogCapture, RunDriver};
use crate::dispatch::{ControllerDispatcher, JobDispatcher, ProcessDispatcher};
use crate::domain::{RunOptions, RunSpec, WorkflowDocument};
use crate::engine::LinearEngine;
use crate::transport::{HttpTransport, LoggingTransport, StatusTransport};

/// skein - workflow run orchestrator
#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one workflow run to completion
    Run {
        /// Identifier of the run (generated if not provided)
        #[arg(long)]
        run_id: Option<String>,

        /// Name of the workspace directory under the shared storage root
        /// (defaults to the run id)
        #[arg(long)]
        workspace: Option<String>,

        /// JSON representation of the workflow document to be run
        #[arg(long, conflicts_with = "workflow_file")]
        workflow_json: Option<String>,

        /// Path to a file holding the workflow document
        #[arg(long)]
        workflow_file: Option<PathBuf>,

        /// JSON representation of the resolved workflow inputs
        #[arg(long, default_value = "{}")]
        parameters: String,

        /// JSON object of operational options (e.g. report_progress)
        #[arg(long, default_value = "{}")]
        operational_options: String,

        /// Where jobs execute
        #[arg(long, value_enum, default_value = "process")]
        dispatcher: DispatcherKind,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Job execution backends selectable from the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DispatcherKind {
    /// Local subprocesses
    Process,

    /// The platform's job-controller service
    Controller,
}

impl Cli {
    /// Resolve the run identity up front, so the log capture can be attached
    /// to the tracing subscriber before any output happens.
    pub fn ensure_run_identity(&mut self) -> Option<Arc<LogCapture>> {
        match &mut self.command {
            Commands::Run { run_id, .. } => {
                let id = run_id
                    .get_or_insert_with(|| Uuid::new_v4().to_string())
                    .clone();
                Some(Arc::new(LogCapture::new(id)))
            }
            Commands::Config => None,
        }
    }

    /// Execute the selected command, returning the process exit code
    pub async fn execute(self, capture: Option<Arc<LogCapture>>) -> Result<i32> {
        match self.command {
            Commands::Run {
                run_id,
                workspace,
                workflow_json,
                workflow_file,
                parameters,
                operational_options,
                dispatcher,
            } => {
                let run_id = run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let capture = capture.unwrap_or_else(|| Arc::new(LogCapture::new(run_id.clone())));

                let document = load_workflow(workflow_json, workflow_file)?;
                let inputs: serde_json::Value = serde_json::from_str(&parameters)
                    .context("workflow parameters are not valid JSON")?;
                let options_value: serde_json::Value = serde_json::from_str(&operational_options)
                    .context("operational options are not valid JSON")?;
                let options = RunOptions::from_value(options_value)
                    .context("operational options must be a JSON object")?;

                let spec = RunSpec {
                    workspace: workspace.unwrap_or_else(|| run_id.clone()),
                    run_id,
                    workflow: WorkflowDocument::new(document),
                    inputs,
                    options,
                };

                run_workflow(spec, dispatcher, capture).await
            }
            Commands::Config => show_config(),
        }
    }
}

fn load_workflow(
    inline: Option<String>,
    file: Option<PathBuf>,
) -> Result<serde_json::Value> {
    let text = match (inline, file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?,
        (None, None) => anyhow::bail!("either --workflow-json or --workflow-file is required"),
    };

    serde_json::from_str(&text).context("workflow document is not valid JSON")
}

async fn run_workflow(
    spec: RunSpec,
    dispatcher: DispatcherKind,
    capture: Arc<LogCapture>,
) -> Result<i32> {
    let cfg = config::config()?;

    info!(
        run_id = %spec.run_id,
        workspace = %spec.workspace,
        jobs = spec.workflow.dispatchable_jobs(),
        "running workflow"
    );

    let transport: Arc<dyn StatusTransport> = match &cfg.status_url {
        Some(url) => Arc::new(HttpTransport::new(url.clone())),
        None => Arc::new(LoggingTransport::new()),
    };

    let job_timeout = Duration::from_secs(
        spec.options
            .job_timeout_seconds()
            .unwrap_or(cfg.job_timeout_seconds),
    );
    let dispatcher: Arc<dyn JobDispatcher> = match dispatcher {
        DispatcherKind::Process => Arc::new(ProcessDispatcher::new(job_timeout)),
        DispatcherKind::Controller => Arc::new(
            ControllerDispatcher::new(cfg.controller_host.clone()).with_job_timeout(job_timeout),
        ),
    };

    let driver = RunDriver::new(Arc::new(LinearEngine::new()), dispatcher, transport)
        .with_default_image(cfg.default_image.clone());

    let outcome = driver.run(spec, &cfg.storage, capture).await;

    if let Some(error) = &outcome.error {
        eprintln!("run failed: {}", error);
    }

    Ok(outcome.code)
}

fn show_config() -> Result<i32> {
    let cfg = config::config()?;

    println!("home:            {}", cfg.home.display());
    println!("storage:         {}", cfg.storage.display());
    println!(
        "status_url:      {}",
        cfg.status_url.as_deref().unwrap_or("(log only)")
    );
    println!("controller_host: {}", cfg.controller_host);
    println!("default_image:   {}", cfg.default_image);
    println!("job_timeout:     {}s", cfg.job_timeout_seconds);
    match &cfg.config_file {
        Some(path) => println!("config_file:     {}", path.display()),
        None => println!("config_file:     (none found)"),
    }

    Ok(0)
}
