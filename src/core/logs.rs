//! Log capture for a run.
//!
//! Every captured line is tagged with the owning run id, appended to the
//! run's durable JSONL store, and kept in a bounded in-memory tail that
//! becomes the terminal event's log excerpt. Persistence problems are
//! downgraded to a warning: the logging subsystem is never allowed to abort
//! a computational run.
//!
//! The capture handle is constructed before the workspace exists (so a
//! tracing layer can be attached at process start) and bound to its durable
//! path once the workspace is prepared; records captured in between are
//! buffered and flushed on bind.

use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use tracing::field::{Field, Visit};
use tracing::{warn, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::domain::{LogRecord, LogSeverity};

/// Lines retained for the terminal log excerpt
const TAIL_LINES: usize = 200;

#[derive(Debug, Default)]
struct CaptureState {
    recent: VecDeque<String>,
    pending: Vec<LogRecord>,
    path: Option<PathBuf>,
}

/// Run-scoped log sink
pub struct LogCapture {
    run_id: String,
    state: Mutex<CaptureState>,
    persist_warned: AtomicBool,
}

impl LogCapture {
    /// Create an unbound capture for a run; records are buffered in memory
    /// until `bind` points it at the workspace log store
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: Mutex::new(CaptureState::default()),
            persist_warned: AtomicBool::new(false),
        }
    }

    /// The run this capture is tagged with
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Bind the capture to the run's log directory and flush buffered records
    pub fn bind(&self, logs_dir: &Path) {
        let path = logs_dir.join("run.jsonl");

        let mut state = self.state.lock().expect("log capture lock poisoned");
        state.path = Some(path.clone());

        let pending = std::mem::take(&mut state.pending);
        for record in &pending {
            if let Err(e) = append_line(&path, record) {
                self.warn_persistence(&e);
            }
        }
    }

    /// Capture one line, tagged with the run id
    pub fn record(&self, severity: LogSeverity, message: &str) {
        let record = LogRecord::new(&self.run_id, severity, message);

        let mut state = self.state.lock().expect("log capture lock poisoned");

        state.recent.push_back(message.to_string());
        while state.recent.len() > TAIL_LINES {
            state.recent.pop_front();
        }

        match &state.path {
            Some(path) => {
                if let Err(e) = append_line(path, &record) {
                    self.warn_persistence(&e);
                }
            }
            None => state.pending.push(record),
        }
    }

    /// The retained tail of captured lines, newest last
    pub fn tail(&self) -> String {
        let state = self.state.lock().expect("log capture lock poisoned");
        state
            .recent
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Read back everything persisted to the durable store
    pub fn stored_records(&self) -> Vec<LogRecord> {
        let path = {
            let state = self.state.lock().expect("log capture lock poisoned");
            state.path.clone()
        };

        let Some(path) = path else {
            return Vec::new();
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// A tracing layer forwarding ambient log events into this capture
    pub fn layer(self: &Arc<Self>) -> CaptureLayer {
        CaptureLayer {
            capture: Arc::clone(self),
        }
    }

    fn warn_persistence(&self, error: &std::io::Error) {
        // Best-effort: warn once, keep the run alive
        if !self.persist_warned.swap(true, Ordering::SeqCst) {
            warn!(run_id = %self.run_id, error = %error, "log persistence failed, continuing without durable logs");
        }
    }
}

fn append_line(path: &Path, record: &LogRecord) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    file.lock_exclusive()?;

    let json = serde_json::to_string(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut file = file;
    writeln!(file, "{}", json)?;
    file.flush()?;

    Ok(())
}

/// Tracing layer that routes ambient events into a `LogCapture`.
///
/// Lets engine-internal log lines be captured without engine changes: any
/// code logging through the process's subscriber lands in the run store.
pub struct CaptureLayer {
    capture: Arc<LogCapture>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // The capture's own persistence warnings must not feed back into it
        if event.metadata().target().starts_with(module_path!()) {
            return;
        }

        let severity = severity_for(*event.metadata().level());

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            self.capture.record(severity, &message);
        }
    }
}

fn severity_for(level: Level) -> LogSeverity {
    if level == Level::ERROR {
        LogSeverity::Error
    } else if level == Level::WARN {
        LogSeverity::Warning
    } else if level == Level::INFO {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_records_are_tagged_and_persisted() {
        let dir = TempDir::new().unwrap();
        let capture = LogCapture::new("run-1");
        capture.bind(dir.path());

        capture.record(LogSeverity::Info, "starting the run");
        capture.record(LogSeverity::Error, "job '#a' failed");

        let stored = capture.stored_records();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| r.run_id == "run-1"));
        assert_eq!(stored[1].severity, LogSeverity::Error);
    }

    #[test]
    fn test_prebind_records_flush_on_bind() {
        let dir = TempDir::new().unwrap();
        let capture = LogCapture::new("run-1");

        capture.record(LogSeverity::Info, "captured before the workspace exists");
        capture.bind(dir.path());
        capture.record(LogSeverity::Info, "captured after");

        let stored = capture.stored_records();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].message, "captured before the workspace exists");
    }

    #[test]
    fn test_tail_is_bounded() {
        let capture = LogCapture::new("run-1");

        for i in 0..(TAIL_LINES + 50) {
            capture.record(LogSeverity::Debug, &format!("line {}", i));
        }

        let tail = capture.tail();
        let lines: Vec<_> = tail.lines().collect();
        assert_eq!(lines.len(), TAIL_LINES);
        assert_eq!(*lines.last().unwrap(), format!("line {}", TAIL_LINES + 49));
        assert!(!tail.contains("line 0\n"));
    }

    #[test]
    fn test_persistence_failure_does_not_panic() {
        let capture = LogCapture::new("run-1");
        // Bind to a directory that does not exist
        capture.bind(Path::new("/definitely/not/a/real/dir"));

        capture.record(LogSeverity::Info, "still alive");

        assert!(capture.tail().contains("still alive"));
        assert!(capture.stored_records().is_empty());
    }

    #[test]
    fn test_layer_forwards_ambient_events() {
        use tracing_subscriber::layer::SubscriberExt;

        let dir = TempDir::new().unwrap();
        let capture = Arc::new(LogCapture::new("run-1"));
        capture.bind(dir.path());

        let subscriber = tracing_subscriber::registry().with(capture.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("ambient engine line");
        });

        let stored = capture.stored_records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message, "ambient engine line");
        assert_eq!(stored[0].severity, LogSeverity::Info);
    }
}
