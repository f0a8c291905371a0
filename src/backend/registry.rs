//! Named backends built from configuration.

use crate::backend::command::CommandBackend;
use crate::backend::contract::Backend;
use crate::backend::echo::EchoBackend;
use crate::backend::http::HttpBackend;
use crate::backend::profile::{BackendConfig, BackendType};
use crate::error::ApiError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the always-present dry-run backend.
pub const ECHO_BACKEND: &str = "echo";

/// Build a backend from its configuration.
pub fn build_backend(name: &str, config: &BackendConfig) -> Result<Arc<dyn Backend>, ApiError> {
    config
        .validate()
        .map_err(|e| ApiError::BackendNotConfigured(format!("Backend '{}': {}", name, e)))?;
    let backend: Arc<dyn Backend> = match config.backend_type {
        BackendType::Command => Arc::new(CommandBackend::new(name, config)?),
        BackendType::OpenAI | BackendType::Ollama => Arc::new(HttpBackend::new(name, config)?),
        BackendType::Echo => Arc::new(EchoBackend::new(name)),
    };
    Ok(backend)
}

/// Backends by name plus the global default.
///
/// A backend whose configuration fails to build stays listed with its error so
/// that selecting it reports why instead of "unknown backend".
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
    broken: HashMap<String, String>,
    default_backend: Option<String>,
}

impl BackendRegistry {
    /// Empty registry with the built-in echo backend.
    pub fn new(default_backend: Option<String>) -> Self {
        let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
        backends.insert(
            ECHO_BACKEND.to_string(),
            Arc::new(EchoBackend::new(ECHO_BACKEND)),
        );
        Self {
            backends,
            broken: HashMap::new(),
            default_backend,
        }
    }

    pub fn from_config(
        configs: &HashMap<String, BackendConfig>,
        default_backend: Option<String>,
    ) -> Self {
        let mut registry = Self::new(default_backend);
        let mut names: Vec<&String> = configs.keys().collect();
        names.sort();
        for name in names {
            match build_backend(name, &configs[name]) {
                Ok(backend) => {
                    debug!(backend = %name, kind = configs[name].backend_type.slug(), "Backend registered");
                    registry.backends.insert(name.clone(), backend);
                }
                Err(e) => {
                    warn!(backend = %name, error = %e, "Backend configuration rejected");
                    registry.backends.remove(name);
                    registry.broken.insert(name.clone(), e.to_string());
                }
            }
        }
        registry
    }

    /// Register or replace a backend.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        let name = backend.name().to_string();
        self.broken.remove(&name);
        self.backends.insert(name, backend);
    }

    pub fn set_default(&mut self, name: Option<String>) {
        self.default_backend = name;
    }

    pub fn default_backend(&self) -> Option<&str> {
        self.default_backend.as_deref()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Backend>, ApiError> {
        if let Some(backend) = self.backends.get(name) {
            return Ok(Arc::clone(backend));
        }
        match self.broken.get(name) {
            Some(reason) => Err(ApiError::BackendNotConfigured(reason.clone())),
            None => Err(ApiError::BackendNotConfigured(format!(
                "Unknown backend '{}'",
                name
            ))),
        }
    }

    /// Pick a backend: explicit parameter, then the resource's declared backend,
    /// then the global default.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        declared: Option<&str>,
    ) -> Result<Arc<dyn Backend>, ApiError> {
        let name = explicit
            .or(declared)
            .or(self.default_backend.as_deref())
            .ok_or_else(|| {
                ApiError::BackendNotConfigured("No backend selected and no default_backend configured".to_string())
            })?;
        self.get(name)
    }

    /// Every known backend name with its build status (`None` when healthy).
    pub fn status(&self) -> BTreeMap<String, Option<String>> {
        let mut status: BTreeMap<String, Option<String>> = self
            .backends
            .keys()
            .map(|name| (name.clone(), None))
            .collect();
        for (name, reason) in &self.broken {
            status.insert(name.clone(), Some(reason.clone()));
        }
        status
    }
}
