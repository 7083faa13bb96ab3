//! Configuration for skein paths and platform endpoints.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SKEIN_HOME, SKEIN_STORAGE, SKEIN_STATUS_URL,
//!    SKEIN_CONTROLLER_HOST, SKEIN_DEFAULT_IMAGE)
//! 2. Config file (.skein/config.yaml)
//! 3. Defaults (~/.skein)
//!
//! Config file discovery:
//! - Searches current directory and parents for .skein/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Container image used for jobs whose node carries no image hint
pub const DEFAULT_CONTAINER_IMAGE: &str = "frolvlad/alpine-bash";

/// Default job-controller service address inside the cluster
pub const DEFAULT_CONTROLLER_HOST: &str = "job-controller.default.svc.cluster.local";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub platform: Option<PlatformConfig>,
    #[serde(default)]
    pub jobs: Option<JobsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Orchestrator state directory (relative to config file)
    pub home: Option<String>,
    /// Shared storage root holding run workspaces (relative to config file)
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Endpoint the HTTP status transport delivers events to
    pub status_url: Option<String>,
    /// Job-controller service address
    pub controller_host: Option<String>,
    /// Default container image for jobs without one
    pub default_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to skein home (orchestrator state)
    pub home: PathBuf,
    /// Absolute path to the shared storage root
    pub storage: PathBuf,
    /// Status endpoint, when the platform transport is configured
    pub status_url: Option<String>,
    /// Job-controller service address
    pub controller_host: String,
    /// Default container image for jobs
    pub default_image: String,
    /// Per-job timeout in seconds
    pub job_timeout_seconds: u64,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".skein").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".skein");

    // Check for config file
    let config_file = find_config_file();
    let file = match config_file.as_deref() {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    // Resolve home path
    let home = if let Some(env_home) = env_var("SKEIN_HOME") {
        PathBuf::from(env_home)
    } else if let Some(home_path) = file.as_ref().and_then(|f| f.paths.home.as_deref()) {
        // home is relative to the .skein/ directory
        let skein_dir = config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new("."));
        resolve_path(skein_dir, home_path)
    } else {
        default_home
    };

    // Resolve shared storage root
    let storage = if let Some(env_storage) = env_var("SKEIN_STORAGE") {
        PathBuf::from(env_storage)
    } else if let Some(storage_path) = file.as_ref().and_then(|f| f.paths.storage.as_deref()) {
        let base_dir = config_file
            .as_deref()
            .and_then(Path::parent) // .skein/
            .and_then(Path::parent) // project root
            .unwrap_or(Path::new("."));
        resolve_path(base_dir, storage_path)
    } else {
        home.join("storage")
    };

    let platform = file.as_ref().and_then(|f| f.platform.as_ref());

    let status_url =
        env_var("SKEIN_STATUS_URL").or_else(|| platform.and_then(|p| p.status_url.clone()));

    let controller_host = env_var("SKEIN_CONTROLLER_HOST")
        .or_else(|| platform.and_then(|p| p.controller_host.clone()))
        .unwrap_or_else(|| DEFAULT_CONTROLLER_HOST.to_string());

    let default_image = env_var("SKEIN_DEFAULT_IMAGE")
        .or_else(|| platform.and_then(|p| p.default_image.clone()))
        .unwrap_or_else(|| DEFAULT_CONTAINER_IMAGE.to_string());

    let job_timeout_seconds = file
        .as_ref()
        .and_then(|f| f.jobs.as_ref())
        .and_then(|j| j.timeout_seconds)
        .unwrap_or(300);

    Ok(ResolvedConfig {
        home,
        storage,
        status_url,
        controller_host,
        default_image,
        job_timeout_seconds,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the shared storage root holding run workspaces
pub fn storage_root() -> Result<PathBuf> {
    Ok(config()?.storage.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let skein_dir = temp.path().join(".skein");
        std::fs::create_dir_all(&skein_dir).unwrap();

        let config_path = skein_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./
  storage: ../storage
platform:
  status_url: http://status.platform.local/events
  default_image: busybox:stable
jobs:
  timeout_seconds: 120
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.paths.storage, Some("../storage".to_string()));

        let platform = config.platform.unwrap();
        assert_eq!(
            platform.status_url.as_deref(),
            Some("http://status.platform.local/events")
        );
        assert_eq!(platform.default_image.as_deref(), Some("busybox:stable"));
        assert_eq!(config.jobs.unwrap().timeout_seconds, Some(120));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_builtin_defaults() {
        assert_eq!(DEFAULT_CONTAINER_IMAGE, "frolvlad/alpine-bash");
        assert!(DEFAULT_CONTROLLER_HOST.starts_with("job-controller"));
    }
}
