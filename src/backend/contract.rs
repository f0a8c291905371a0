//! Backend contract: run a literal prompt against a named computation engine.

use crate::error::ApiError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// One prompt execution request.
#[derive(Debug, Clone, Default)]
pub struct BackendRequest {
    pub prompt: String,
    /// Model override; backends fall back to their configured model
    pub model: Option<String>,
    pub workdir: Option<PathBuf>,
    /// Upper bound on the call, enforced by the caller
    pub timeout: Option<Duration>,
}

impl BackendRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Successful backend output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    pub text: String,
}

/// Executes prompts. Implementations must be safe to call concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name as configured
    fn name(&self) -> &str;

    /// Run the prompt. Failures come back as `ApiError::BackendFailed` with the
    /// engine's own message so callers can surface it verbatim.
    async fn execute(&self, request: BackendRequest) -> Result<BackendOutput, ApiError>;
}
