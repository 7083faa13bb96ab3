//! Workflow document model.
//!
//! A workflow arrives as a packed JSON document: a `$graph` array holding the
//! synthetic root workflow node plus one node per dispatchable tool. The
//! orchestrator never interprets tool semantics; it only needs the node list
//! and the derived count of dispatchable jobs.

use serde_json::Value;

/// A frozen workflow description for one run.
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    doc: Value,
}

impl WorkflowDocument {
    /// Wrap a parsed workflow document
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    /// The raw document, as received from the platform
    pub fn as_value(&self) -> &Value {
        &self.doc
    }

    /// All nodes of the packed `$graph`, in document order
    pub fn graph(&self) -> Vec<GraphNode> {
        let Some(nodes) = self.doc.get("$graph").and_then(Value::as_array) else {
            return Vec::new();
        };

        nodes
            .iter()
            .enumerate()
            .map(|(index, node)| GraphNode::from_value(index, node.clone()))
            .collect()
    }

    /// Number of nodes in the packed graph (zero if the document is not packed)
    pub fn graph_len(&self) -> usize {
        self.doc
            .get("$graph")
            .and_then(Value::as_array)
            .map(|nodes| nodes.len())
            .unwrap_or(0)
    }

    /// The nodes that will actually be dispatched as jobs.
    ///
    /// When nodes carry a `class` tag, every non-`Workflow` node is a job.
    /// Untagged documents fall back to the platform convention that the first
    /// node is the aggregate root and is not dispatched itself.
    pub fn dispatchable_nodes(&self) -> Vec<GraphNode> {
        let nodes = self.graph();

        if nodes.iter().any(|n| n.class.is_some()) {
            nodes.into_iter().filter(|n| !n.is_root()).collect()
        } else {
            nodes.into_iter().skip(1).collect()
        }
    }

    /// The fixed job total for progress accounting
    pub fn dispatchable_jobs(&self) -> usize {
        self.dispatchable_nodes().len()
    }
}

/// One node of the packed workflow graph
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Node identifier (`id` field, or a positional fallback)
    pub id: String,

    /// CWL-style class tag (`Workflow`, `CommandLineTool`, ...)
    pub class: Option<String>,

    /// The full node object
    pub doc: Value,
}

impl GraphNode {
    fn from_value(index: usize, doc: Value) -> Self {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#node-{}", index));

        let class = doc
            .get("class")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self { id, class, doc }
    }

    /// Whether this is the synthetic aggregate root, which is never
    /// dispatched as a job
    pub fn is_root(&self) -> bool {
        self.class.as_deref() == Some("Workflow")
    }

    /// Short display name (the id without its `#` prefix)
    pub fn name(&self) -> &str {
        self.id.trim_start_matches('#')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn packed(nodes: Value) -> WorkflowDocument {
        WorkflowDocument::new(json!({ "cwlVersion": "v1.0", "$graph": nodes }))
    }

    #[test]
    fn test_job_total_excludes_workflow_root() {
        let doc = packed(json!([
            { "id": "#main", "class": "Workflow" },
            { "id": "#a", "class": "CommandLineTool" },
            { "id": "#b", "class": "CommandLineTool" },
            { "id": "#c", "class": "CommandLineTool" },
        ]));

        assert_eq!(doc.graph_len(), 4);
        assert_eq!(doc.dispatchable_jobs(), 3);
        assert!(doc.dispatchable_nodes().iter().all(|n| !n.is_root()));
    }

    #[test]
    fn test_untagged_graph_falls_back_to_first_node_convention() {
        let doc = packed(json!([
            { "id": "#main" },
            { "id": "#a" },
            { "id": "#b" },
            { "id": "#c" },
        ]));

        assert_eq!(doc.dispatchable_jobs(), 3);
        assert_eq!(doc.dispatchable_nodes()[0].id, "#a");
    }

    #[test]
    fn test_two_node_graph_has_one_job() {
        let doc = packed(json!([
            { "id": "#main", "class": "Workflow" },
            { "id": "#only", "class": "CommandLineTool" },
        ]));

        assert_eq!(doc.dispatchable_jobs(), 1);
    }

    #[test]
    fn test_unpacked_document_has_no_jobs() {
        let doc = WorkflowDocument::new(json!({ "class": "CommandLineTool" }));

        assert_eq!(doc.graph_len(), 0);
        assert_eq!(doc.dispatchable_jobs(), 0);
    }

    #[test]
    fn test_node_without_id_gets_positional_fallback() {
        let doc = packed(json!([
            { "class": "Workflow" },
            { "class": "CommandLineTool" },
        ]));

        let nodes = doc.graph();
        assert_eq!(nodes[0].id, "#node-0");
        assert_eq!(nodes[1].id, "#node-1");
        assert_eq!(nodes[1].name(), "node-1");
    }
}
