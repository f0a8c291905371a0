//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, the global file, the
//! workspace file, then `WEFT_*` environment variables.

pub mod facade;
pub mod merge;
pub mod sources;
pub mod xdg;

pub use facade::ConfigLoader;

use crate::backend::BackendConfig;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::resource::RegistrySettings;
use merge::merge_policy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftConfig {
    /// Backend used when neither the caller nor the resource names one
    #[serde(default = "default_backend")]
    pub default_backend: Option<String>,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub intent: IntentConfig,

    /// Backends by name
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_backend() -> Option<String> {
    Some(merge_policy::DEFAULT_BACKEND.to_string())
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            registry: RegistryConfig::default(),
            scheduler: SchedulerSection::default(),
            intent: IntentConfig::default(),
            backends: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WeftConfig {
    /// Reject values no component can work with. Backend tables are checked when
    /// the backend registry is built so one bad backend does not block the rest.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.scheduler.max_workers == 0 {
            return Err(ApiError::ConfigError(
                "scheduler.max_workers must be at least 1".to_string(),
            ));
        }
        if self.scheduler.task_timeout_secs == Some(0) {
            return Err(ApiError::ConfigError(
                "scheduler.task_timeout_secs must be positive".to_string(),
            ));
        }
        if self.intent.max_candidates == 0 {
            return Err(ApiError::ConfigError(
                "intent.max_candidates must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.intent.min_score) {
            return Err(ApiError::ConfigError(format!(
                "intent.min_score must be between 0.0 and 1.0, got {}",
                self.intent.min_score
            )));
        }
        Ok(())
    }
}

/// `[registry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Resource roots in precedence order. Relative paths resolve against the
    /// workspace. Empty means `<workspace>/.weft/resources` then the global root.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Cache directory; defaults to the workspace data dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    merge_policy::DEFAULT_CACHE_TTL_SECS
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            cache_dir: None,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RegistryConfig {
    /// Resolve sources and cache location for a workspace.
    pub fn settings(&self, workspace_root: &Path) -> Result<RegistrySettings, ApiError> {
        let sources = if self.sources.is_empty() {
            let mut sources = vec![workspace_root.join(".weft").join("resources")];
            if let Ok(global) = xdg::global_resources_dir() {
                sources.push(global);
            }
            sources
        } else {
            self.sources
                .iter()
                .map(|source| absolutize(workspace_root, source))
                .collect()
        };

        let cache_dir = match &self.cache_dir {
            Some(dir) => absolutize(workspace_root, dir),
            None => xdg::workspace_data_dir(workspace_root)?.join("registry"),
        };

        Ok(RegistrySettings {
            sources,
            cache_dir: Some(cache_dir),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        })
    }
}

fn absolutize(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// `[scheduler]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Default per-task timeout; tasks may override
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub skip_dependents_of_failed: bool,
}

fn default_max_workers() -> usize {
    merge_policy::DEFAULT_MAX_WORKERS as usize
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: None,
            skip_dependents_of_failed: true,
        }
    }
}

/// `[intent]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_max_candidates() -> usize {
    merge_policy::DEFAULT_MAX_CANDIDATES as usize
}

fn default_min_score() -> f64 {
    merge_policy::DEFAULT_MIN_SCORE
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            min_score: default_min_score(),
        }
    }
}
