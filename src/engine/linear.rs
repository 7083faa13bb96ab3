//! Default engine: document-order graph traversal.
//!
//! Packed workflow documents list tool nodes in dependency order, so this
//! engine assembles the dispatchable nodes in document order and hands the
//! whole graph to the executor hook. Engines with real dependency resolution
//! or parallel dispatch implement the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::WorkflowDocument;

use super::{EngineContext, EngineFault, EngineHooks, RunnableGraph, WorkflowEngine};

/// Engine that dispatches jobs in document order
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearEngine;

impl LinearEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkflowEngine for LinearEngine {
    fn name(&self) -> &str {
        "linear"
    }

    async fn run(
        &self,
        workflow: WorkflowDocument,
        inputs: Value,
        hooks: Arc<dyn EngineHooks>,
        ctx: Arc<EngineContext>,
    ) -> Result<Value, EngineFault> {
        let nodes = workflow.dispatchable_nodes();
        if nodes.is_empty() {
            return Err(EngineFault::EmptyGraph);
        }

        let mut graph = RunnableGraph::default();
        for node in &nodes {
            graph.runnables.push(hooks.construct_runnable(node, &ctx)?);
        }

        debug!(run_id = %ctx.run_id, jobs = graph.len(), "graph assembled");

        hooks.execute_graph(graph, &inputs, &ctx).await
    }
}
