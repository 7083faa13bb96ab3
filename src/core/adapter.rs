//! Engine invocation adapter.
//!
//! Implements the two engine hooks. Construction turns a graph node into a
//! dispatchable runnable with the run's default container image applied;
//! execution walks the assembled graph, routes every job through the
//! injected dispatcher, and feeds start/finish observations to the progress
//! tracker. A failure inside either hook is accounted and logged, then
//! surfaced — never swallowed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::dispatch::{JobDispatcher, JobRequest};
use crate::domain::{GraphNode, LogSeverity};
use crate::engine::{EngineContext, EngineFault, EngineHooks, Runnable, RunnableGraph};

use super::progress::SharedProgress;

/// The orchestrator's hook implementation for one run
pub struct RunAdapter {
    progress: SharedProgress,
    dispatcher: Arc<dyn JobDispatcher>,
    default_image: String,
}

impl RunAdapter {
    /// Create the adapter for one run
    pub fn new(
        progress: SharedProgress,
        dispatcher: Arc<dyn JobDispatcher>,
        default_image: impl Into<String>,
    ) -> Self {
        Self {
            progress,
            dispatcher,
            default_image: default_image.into(),
        }
    }

    async fn run_job(&self, runnable: &Runnable, ctx: &EngineContext) -> Result<String, EngineFault> {
        let job_id = &runnable.job_id;
        let report = ctx.options.report_progress();

        let snapshot = self.progress.job_started(job_id)?;
        ctx.logs
            .record(LogSeverity::Info, &format!("job '{}' started", runnable.name));
        if report {
            ctx.publisher.publish_progress(snapshot).await;
        }

        let request = JobRequest {
            job_id: job_id.clone(),
            name: runnable.name.clone(),
            command: runnable.command.clone(),
            image: runnable.image.clone(),
            workdir: ctx.paths.tmp_dir.clone(),
            output_dir: ctx.paths.out_dir.clone(),
        };

        match self.dispatcher.dispatch(&request).await {
            Ok(output) => {
                let snapshot = self.progress.job_finished(job_id, true)?;
                ctx.logs
                    .record(LogSeverity::Info, &format!("job '{}' finished", runnable.name));
                if report {
                    ctx.publisher.publish_progress(snapshot).await;
                }
                debug!(job_id = %job_id, dispatcher = self.dispatcher.name(), "job finished");
                Ok(output.logs)
            }
            Err(e) => {
                // Account the failure before surfacing it
                let snapshot = self.progress.job_finished(job_id, false)?;
                ctx.logs.record(
                    LogSeverity::Error,
                    &format!("job '{}' failed: {}", runnable.name, e),
                );
                if report {
                    ctx.publisher.publish_progress(snapshot).await;
                }
                error!(job_id = %job_id, error = %e, "job failed");
                Err(EngineFault::Job {
                    job_id: job_id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl EngineHooks for RunAdapter {
    fn construct_runnable(
        &self,
        node: &GraphNode,
        _ctx: &EngineContext,
    ) -> Result<Runnable, EngineFault> {
        let command = command_line(&node.doc);
        if command.is_empty() {
            return Err(EngineFault::Construct {
                node_id: node.id.clone(),
                reason: "node has no baseCommand".to_string(),
            });
        }

        let image = docker_image(&node.doc).unwrap_or_else(|| self.default_image.clone());

        Ok(Runnable {
            job_id: node.id.clone(),
            name: node.name().to_string(),
            command,
            image: Some(image),
            node: node.doc.clone(),
        })
    }

    async fn execute_graph(
        &self,
        graph: RunnableGraph,
        _inputs: &Value,
        ctx: &EngineContext,
    ) -> Result<Value, EngineFault> {
        let mut outputs = Map::new();

        for runnable in &graph.runnables {
            let logs = self.run_job(runnable, ctx).await?;
            outputs.insert(runnable.name.clone(), Value::String(logs));
        }

        Ok(Value::Object(outputs))
    }
}

/// Derive the command line from a tool node (`baseCommand` + `arguments`)
fn command_line(node: &Value) -> Vec<String> {
    let mut command = Vec::new();

    match node.get("baseCommand") {
        Some(Value::String(s)) => command.push(s.clone()),
        Some(Value::Array(parts)) => {
            command.extend(parts.iter().filter_map(Value::as_str).map(str::to_string));
        }
        _ => {}
    }

    if let Some(Value::Array(args)) = node.get("arguments") {
        command.extend(args.iter().filter_map(Value::as_str).map(str::to_string));
    }

    command
}

/// Container image hint from the node's requirements or hints
fn docker_image(node: &Value) -> Option<String> {
    for key in ["requirements", "hints"] {
        let Some(Value::Array(entries)) = node.get(key) else {
            continue;
        };

        for entry in entries {
            if entry.get("class").and_then(Value::as_str) == Some("DockerRequirement") {
                if let Some(image) = entry.get("dockerPull").and_then(Value::as_str) {
                    return Some(image.to_string());
                }
            }
        }
    }

    None
}
