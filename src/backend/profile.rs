//! Backend configuration owned by the backend domain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backend configuration, one per `[backends.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type.
    pub backend_type: BackendType,

    /// Program to spawn for command backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Arguments for command backends. `{model}` is substituted.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for command backends.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL for HTTP backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key optional and can be loaded from environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature for HTTP backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Default per-call timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Backend type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// External CLI fed through stdin
    Command,
    #[serde(rename = "openai")]
    OpenAI,
    Ollama,
    /// Returns the prompt unchanged
    Echo,
}

impl BackendType {
    pub fn slug(&self) -> &'static str {
        match self {
            BackendType::Command => "command",
            BackendType::OpenAI => "openai",
            BackendType::Ollama => "ollama",
            BackendType::Echo => "echo",
        }
    }

    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            BackendType::OpenAI => Some("https://api.openai.com/v1"),
            BackendType::Ollama => Some("http://localhost:11434"),
            BackendType::Command | BackendType::Echo => None,
        }
    }
}

impl BackendConfig {
    /// Minimal config for a backend type.
    pub fn of_type(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            program: None,
            args: Vec::new(),
            env: HashMap::new(),
            model: None,
            endpoint: None,
            api_key: None,
            temperature: None,
            timeout_secs: None,
        }
    }

    fn endpoint_has_scheme(endpoint: &str) -> bool {
        endpoint.starts_with("http://") || endpoint.starts_with("https://")
    }

    /// Endpoint with the type default applied and trailing slashes removed.
    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .as_deref()
            .or_else(|| self.backend_type.default_endpoint())
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
    }

    /// API key from config or the backend type's environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| match self.backend_type {
            BackendType::OpenAI => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        })
    }

    /// Validate backend configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self.backend_type {
            BackendType::Command => {
                let program = self.program.as_deref().unwrap_or_default();
                if program.trim().is_empty() {
                    return Err("Command backend requires a program".to_string());
                }
            }
            BackendType::OpenAI | BackendType::Ollama => {
                let model = self.model.as_deref().unwrap_or_default();
                if model.trim().is_empty() {
                    return Err("Model name cannot be empty".to_string());
                }
                if let Some(endpoint) = &self.endpoint {
                    if !Self::endpoint_has_scheme(endpoint.trim()) {
                        return Err(format!("Invalid endpoint URL: {}", endpoint));
                    }
                }
            }
            BackendType::Echo => {}
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temp
                ));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err("Timeout must be positive".to_string());
        }

        Ok(())
    }
}
