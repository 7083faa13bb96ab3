//! Engine interfaces for workflow execution.
//!
//! The external engine is a black box that traverses the workflow graph; the
//! orchestrator observes and steers it only through the two hooks defined
//! here. Any conforming engine can be substituted, including scripted test
//! doubles.

pub mod context;
pub mod linear;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::progress::ProtocolViolation;
use crate::domain::{GraphNode, WorkflowDocument};

// Re-export the engine building blocks
pub use context::EngineContext;
pub use linear::LinearEngine;

/// Faults raised from inside the engine or its hooks
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("job '{job_id}' failed: {reason}")]
    Job { job_id: String, reason: String },

    #[error("could not construct runnable for node '{node_id}': {reason}")]
    Construct { node_id: String, reason: String },

    #[error("workflow document has no dispatchable graph")]
    EmptyGraph,

    #[error("job accounting diverged: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("engine fault: {0}")]
    Internal(String),
}

/// An engine-dispatchable representation of one graph node
#[derive(Debug, Clone)]
pub struct Runnable {
    /// Graph node identifier
    pub job_id: String,

    /// Short display name
    pub name: String,

    /// Command line derived from the node
    pub command: Vec<String>,

    /// Container image for the job
    pub image: Option<String>,

    /// The originating node object
    pub node: Value,
}

/// The assembled graph handed to the executor hook
#[derive(Debug, Clone, Default)]
pub struct RunnableGraph {
    pub runnables: Vec<Runnable>,
}

impl RunnableGraph {
    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }
}

/// Hook surface the orchestrator hands to the engine for one run.
///
/// The construction hook turns a graph node into a `Runnable`; the executor
/// hook runs the assembled graph and returns the output mapping. Per-job
/// lifecycle observation happens inside the executor hook implementation.
#[async_trait]
pub trait EngineHooks: Send + Sync {
    /// Construction hook: translate one graph node
    fn construct_runnable(
        &self,
        node: &GraphNode,
        ctx: &EngineContext,
    ) -> Result<Runnable, EngineFault>;

    /// Executor hook: run the assembled graph, returning its output mapping
    async fn execute_graph(
        &self,
        graph: RunnableGraph,
        inputs: &Value,
        ctx: &EngineContext,
    ) -> Result<Value, EngineFault>;
}

/// A workflow engine: owns graph traversal and invokes the hooks
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Drive one workflow to completion through the hooks
    async fn run(
        &self,
        workflow: WorkflowDocument,
        inputs: Value,
        hooks: Arc<dyn EngineHooks>,
        ctx: Arc<EngineContext>,
    ) -> Result<Value, EngineFault>;
}
