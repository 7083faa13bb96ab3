//! Workspace preparation for a run.
//!
//! All filesystem mutation for a run funnels through here: the isolated run
//! directory, the frozen workflow and input documents, the scratch
//! directories, and the sibling outputs directory. Tests substitute a temp
//! directory for the shared storage root.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::domain::RunSpec;

/// Errors raised while materializing a run workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("run directory already exists and is not empty: {}", .0.display())]
    Collision(PathBuf),

    #[error("could not create {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("could not write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("could not serialize frozen document: {0}")]
    Freeze(#[from] serde_json::Error),

    #[error("run directory is already locked by another run: {}: {source}", .path.display())]
    Locked { path: PathBuf, source: io::Error },
}

/// Resolved absolute paths of a prepared workspace
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    /// The run directory itself
    pub root: PathBuf,

    /// Frozen workflow document
    pub workflow_file: PathBuf,

    /// Frozen resolved inputs
    pub inputs_file: PathBuf,

    /// Scratch directory for intermediate job data
    pub tmp_dir: PathBuf,

    /// Scratch directory for per-job output staging
    pub out_dir: PathBuf,

    /// Per-run log store directory
    pub logs_dir: PathBuf,

    /// Final outputs directory, sibling of the run directory
    pub outputs_dir: PathBuf,

    /// Checksums of the frozen documents
    pub manifest_file: PathBuf,
}

/// Checksums of what the run actually saw
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkspaceManifest {
    pub run_id: String,
    pub workflow_sha256: String,
    pub inputs_sha256: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// A prepared run workspace, holding its exclusive lock until dropped
pub struct Workspace {
    pub paths: WorkspacePaths,
    // Advisory lock held for the run's lifetime; released on drop
    _lock: std::fs::File,
}

impl Workspace {
    /// Materialize the directory tree for one run.
    ///
    /// Refuses a non-empty existing run directory so stale state is never
    /// silently reused.
    pub async fn prepare(storage_root: &Path, spec: &RunSpec) -> Result<Self, WorkspaceError> {
        let root = storage_root.join(&spec.workspace);

        if is_nonempty_dir(&root).await {
            return Err(WorkspaceError::Collision(root));
        }

        create_dir(&root).await?;
        let lock = acquire_lock(&root)?;

        let paths = WorkspacePaths {
            workflow_file: root.join("workflow.json"),
            inputs_file: root.join("inputs.json"),
            tmp_dir: root.join("cwl").join("tmpdir"),
            out_dir: root.join("cwl").join("outdir"),
            logs_dir: root.join("logs"),
            outputs_dir: root
                .parent()
                .unwrap_or(&root)
                .join("outputs"),
            manifest_file: root.join("manifest.json"),
            root: root.clone(),
        };

        info!(run_id = %spec.run_id, workspace = %root.display(), "freezing workflow specification and input parameters");

        let workflow_bytes = serde_json::to_vec_pretty(spec.workflow.as_value())?;
        let inputs_bytes = serde_json::to_vec_pretty(&spec.inputs)?;

        write_file(&paths.workflow_file, &workflow_bytes).await?;
        write_file(&paths.inputs_file, &inputs_bytes).await?;

        create_dir(&paths.tmp_dir).await?;
        create_dir(&paths.out_dir).await?;
        create_dir(&paths.logs_dir).await?;
        create_dir(&paths.outputs_dir).await?;

        let manifest = WorkspaceManifest {
            run_id: spec.run_id.clone(),
            workflow_sha256: checksum(&workflow_bytes),
            inputs_sha256: checksum(&inputs_bytes),
            created_at: Utc::now(),
        };
        write_file(&paths.manifest_file, &serde_json::to_vec_pretty(&manifest)?).await?;

        Ok(Self { paths, _lock: lock })
    }
}

/// SHA-256 of a frozen document, hex encoded
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

async fn is_nonempty_dir(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

async fn create_dir(path: &Path) -> Result<(), WorkspaceError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| WorkspaceError::Create {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), WorkspaceError> {
    fs::write(path, bytes)
        .await
        .map_err(|source| WorkspaceError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn acquire_lock(root: &Path) -> Result<std::fs::File, WorkspaceError> {
    let lock_path = root.join(".lock");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|source| WorkspaceError::Create {
            path: lock_path.clone(),
            source,
        })?;

    file.try_lock_exclusive()
        .map_err(|source| WorkspaceError::Locked {
            path: lock_path,
            source,
        })?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunOptions, WorkflowDocument};
    use serde_json::json;
    use tempfile::TempDir;

    fn spec(workspace: &str) -> RunSpec {
        RunSpec {
            run_id: "run-1".to_string(),
            workspace: workspace.to_string(),
            workflow: WorkflowDocument::new(json!({
                "$graph": [
                    { "id": "#main", "class": "Workflow" },
                    { "id": "#a", "class": "CommandLineTool", "baseCommand": ["true"] },
                ]
            })),
            inputs: json!({ "threshold": 0.5 }),
            options: RunOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_prepare_creates_full_layout() {
        let storage = TempDir::new().unwrap();
        let workspace = Workspace::prepare(storage.path(), &spec("run-1"))
            .await
            .unwrap();

        let paths = &workspace.paths;
        assert!(paths.workflow_file.is_file());
        assert!(paths.inputs_file.is_file());
        assert!(paths.tmp_dir.is_dir());
        assert!(paths.out_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
        assert!(paths.outputs_dir.is_dir());
        assert!(paths.manifest_file.is_file());

        // Sibling outputs directory, next to the run directory
        assert_eq!(paths.outputs_dir, storage.path().join("outputs"));
    }

    #[tokio::test]
    async fn test_frozen_documents_match_spec() {
        let storage = TempDir::new().unwrap();
        let spec = spec("run-1");
        let workspace = Workspace::prepare(storage.path(), &spec).await.unwrap();

        let frozen: serde_json::Value = serde_json::from_slice(
            &std::fs::read(&workspace.paths.workflow_file).unwrap(),
        )
        .unwrap();
        assert_eq!(&frozen, spec.workflow.as_value());

        let inputs: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&workspace.paths.inputs_file).unwrap()).unwrap();
        assert_eq!(inputs, json!({ "threshold": 0.5 }));
    }

    #[tokio::test]
    async fn test_manifest_records_checksums() {
        let storage = TempDir::new().unwrap();
        let workspace = Workspace::prepare(storage.path(), &spec("run-1"))
            .await
            .unwrap();

        let manifest: WorkspaceManifest = serde_json::from_slice(
            &std::fs::read(&workspace.paths.manifest_file).unwrap(),
        )
        .unwrap();

        let workflow_bytes = std::fs::read(&workspace.paths.workflow_file).unwrap();
        assert_eq!(manifest.workflow_sha256, checksum(&workflow_bytes));
        assert_eq!(manifest.run_id, "run-1");
    }

    #[tokio::test]
    async fn test_nonempty_run_directory_is_refused() {
        let storage = TempDir::new().unwrap();
        let run_dir = storage.path().join("run-1");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join("stale.json"), b"{}").unwrap();

        let result = Workspace::prepare(storage.path(), &spec("run-1")).await;

        assert!(matches!(result, Err(WorkspaceError::Collision(_))));
    }

    #[tokio::test]
    async fn test_empty_existing_directory_is_reused() {
        let storage = TempDir::new().unwrap();
        std::fs::create_dir_all(storage.path().join("run-1")).unwrap();

        assert!(Workspace::prepare(storage.path(), &spec("run-1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unwritable_root_fails_fast() {
        let storage = TempDir::new().unwrap();
        // A plain file where a directory is needed makes every create fail
        let bogus_root = storage.path().join("not-a-dir");
        std::fs::write(&bogus_root, b"").unwrap();

        let result = Workspace::prepare(&bogus_root, &spec("run-1")).await;

        assert!(matches!(result, Err(WorkspaceError::Create { .. })));
    }
}
