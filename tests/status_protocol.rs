//! Status Protocol Integration Tests
//!
//! Ordering and exactly-once guarantees on the published event stream.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use skein::core::{LogCapture, RunDriver};
use skein::dispatch::{DispatchError, JobDispatcher, JobOutput, JobRequest};
use skein::domain::{RunOptions, RunSpec, WorkflowDocument};
use skein::engine::LinearEngine;
use skein::transport::{FailingTransport, InMemoryTransport};

/// Dispatcher double where every job succeeds
struct AlwaysOkDispatcher;

#[async_trait]
impl JobDispatcher for AlwaysOkDispatcher {
    fn name(&self) -> &str {
        "always-ok"
    }

    async fn dispatch(&self, job: &JobRequest) -> Result<JobOutput, DispatchError> {
        Ok(JobOutput {
            logs: format!("ran {}", job.name),
        })
    }
}

fn packed_doc(job_ids: &[&str]) -> WorkflowDocument {
    let mut graph = vec![json!({ "id": "#main", "class": "Workflow" })];
    for id in job_ids {
        graph.push(json!({
            "id": id,
            "class": "CommandLineTool",
            "baseCommand": ["true"],
        }));
    }

    WorkflowDocument::new(json!({ "$graph": graph }))
}

fn spec(workflow: WorkflowDocument, options: RunOptions) -> RunSpec {
    RunSpec {
        run_id: "run-1".to_string(),
        workspace: "run-1".to_string(),
        workflow,
        inputs: json!({}),
        options,
    }
}

#[tokio::test]
async fn test_default_stream_is_exactly_started_then_terminal() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    let outcome = driver
        .run(
            spec(packed_doc(&["#a", "#b", "#c"]), RunOptions::default()),
            storage.path(),
            Arc::new(LogCapture::new("run-1")),
        )
        .await;

    assert_eq!(outcome.code, 0);

    let phases = transport.phases();
    // Exactly one phase-1 event before the terminal, exactly one terminal,
    // and the terminal is last
    assert_eq!(phases, vec![1, 2]);
}

#[tokio::test]
async fn test_progress_reporting_keeps_terminal_last_and_unique() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    let mut options = RunOptions::default();
    options.set("report_progress", json!(true));

    let outcome = driver
        .run(
            spec(packed_doc(&["#a", "#b", "#c"]), options),
            storage.path(),
            Arc::new(LogCapture::new("run-1")),
        )
        .await;

    assert_eq!(outcome.code, 0);

    let phases = transport.phases();
    // started + (start, finish) per job + terminal
    assert_eq!(phases.len(), 8);

    let terminal_count = phases.iter().filter(|p| **p != 1).count();
    assert_eq!(terminal_count, 1);
    assert_eq!(*phases.last().unwrap(), 2);
    assert!(phases[..phases.len() - 1].iter().all(|p| *p == 1));
}

#[tokio::test]
async fn test_intermediate_snapshots_advance_monotonically() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    let mut options = RunOptions::default();
    options.set("report_progress", json!(true));

    driver
        .run(
            spec(packed_doc(&["#a", "#b"]), options),
            storage.path(),
            Arc::new(LogCapture::new("run-1")),
        )
        .await;

    let finished_counts: Vec<u64> = transport
        .sent()
        .iter()
        .filter_map(|event| event.message.as_ref())
        .filter_map(|message| message.get("progress"))
        .filter_map(|progress| progress["finished"]["total"].as_u64())
        .collect();

    // finished never decreases across the stream
    assert!(finished_counts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*finished_counts.last().unwrap(), 2);
}

#[tokio::test]
async fn test_transport_outage_never_fails_the_run() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(FailingTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    let outcome = driver
        .run(
            spec(packed_doc(&["#a"]), RunOptions::default()),
            storage.path(),
            Arc::new(LogCapture::new("run-1")),
        )
        .await;

    // Both the started and terminal deliveries failed, the run still succeeded
    assert_eq!(outcome.code, 0);
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test]
async fn test_wire_shape_of_the_terminal_event() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    driver
        .run(
            spec(packed_doc(&["#a"]), RunOptions::default()),
            storage.path(),
            Arc::new(LogCapture::new("run-1")),
        )
        .await;

    let sent = transport.sent();
    let terminal = sent.last().unwrap();
    assert_eq!(terminal.run_id, "run-1");

    let message = terminal.message.as_ref().unwrap();
    let progress = &message["progress"];
    for bucket in ["total", "running", "finished", "failed"] {
        assert!(progress[bucket].get("total").is_some(), "missing {bucket}.total");
        assert!(
            progress[bucket].get("job_ids").is_some(),
            "missing {bucket}.job_ids"
        );
    }
    assert_eq!(progress["finished"]["job_ids"], json!(["#a"]));
}

#[tokio::test]
async fn test_run_ids_tag_every_event() {
    let storage = TempDir::new().unwrap();
    let transport = Arc::new(InMemoryTransport::new());
    let driver = RunDriver::new(
        Arc::new(LinearEngine::new()),
        Arc::new(AlwaysOkDispatcher),
        transport.clone(),
    );

    let mut spec = spec(packed_doc(&["#a"]), RunOptions::default());
    spec.run_id = "run-tagging".to_string();
    spec.workspace = "run-tagging".to_string();

    driver
        .run(spec, storage.path(), Arc::new(LogCapture::new("run-tagging")))
        .await;

    let sent = transport.sent();
    assert!(!sent.is_empty());
    assert!(sent.iter().all(|event| event.run_id == "run-tagging"));
}
