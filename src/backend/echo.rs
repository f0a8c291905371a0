//! Echo backend: returns the prompt unchanged. Used for dry runs.

use crate::backend::contract::{Backend, BackendOutput, BackendRequest};
use crate::error::ApiError;
use async_trait::async_trait;

pub struct EchoBackend {
    name: String,
}

impl EchoBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Backend for EchoBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: BackendRequest) -> Result<BackendOutput, ApiError> {
        Ok(BackendOutput {
            text: request.prompt,
        })
    }
}
