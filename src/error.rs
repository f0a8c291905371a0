//! Error types for the orchestration engine.
//!
//! `ApiError` is what every public operation returns. Expected per-task failures
//! (unavailable resource, backend error) never travel through it: those end up in a
//! failed `TaskResult`. `ApiError` is reserved for structural problems.

use thiserror::Error;

/// Low-level storage and filesystem errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors surfaced by the orchestration API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Failed to parse resource content at {path}: {reason}")]
    ContentParse { path: String, reason: String },

    #[error("Backend not configured: {0}")]
    BackendNotConfigured(String),

    #[error("Backend request failed: {0}")]
    BackendFailed(String),

    #[error("Backend timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Dependency cycle detected among tasks: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Batch protocol error at line {line}: {reason}")]
    Protocol { line: usize, reason: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::StorageError(StorageError::IoError(err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::StorageError(StorageError::Serialization(err))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
