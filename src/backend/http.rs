//! HTTP backends: OpenAI-compatible chat completions and Ollama generate.

use crate::backend::contract::{Backend, BackendOutput, BackendRequest};
use crate::backend::profile::{BackendConfig, BackendType};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerate {
    response: String,
}

/// HTTP-backed engine.
pub struct HttpBackend {
    name: String,
    backend_type: BackendType,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl HttpBackend {
    pub fn new(name: &str, config: &BackendConfig) -> Result<Self, ApiError> {
        config.validate().map_err(|e| {
            ApiError::BackendNotConfigured(format!("Backend '{}': {}", name, e))
        })?;
        let endpoint = config.resolved_endpoint().ok_or_else(|| {
            ApiError::BackendNotConfigured(format!("Backend '{}' requires an endpoint", name))
        })?;
        let api_key = config.resolved_api_key();
        if config.backend_type == BackendType::OpenAI && api_key.is_none() {
            return Err(ApiError::BackendNotConfigured(format!(
                "Backend '{}': API key required (set in config or OPENAI_API_KEY env var)",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            backend_type: config.backend_type,
            client: reqwest::Client::new(),
            endpoint,
            model: config.model.clone().unwrap_or_default(),
            api_key,
            temperature: config.temperature,
        })
    }

    async fn chat_completion(&self, model: &str, prompt: &str) -> Result<String, ApiError> {
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::BackendFailed(format!("HTTP {}: {}", status, text)));
        }
        let completion: ChatCompletion = response.json().await.map_err(request_failed)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ApiError::BackendFailed("response contained no choices".to_string()))
    }

    async fn ollama_generate(&self, model: &str, prompt: &str) -> Result<String, ApiError> {
        let mut body = json!({ "model": model, "prompt": prompt, "stream": false });
        if let Some(temperature) = self.temperature {
            body["options"] = json!({ "temperature": temperature });
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::BackendFailed(format!("HTTP {}: {}", status, text)));
        }
        let generated: OllamaGenerate = response.json().await.map_err(request_failed)?;
        Ok(generated.response)
    }
}

fn request_failed(err: reqwest::Error) -> ApiError {
    ApiError::BackendFailed(err.to_string())
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: BackendRequest) -> Result<BackendOutput, ApiError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        debug!(backend = %self.name, model, endpoint = %self.endpoint, "Sending backend request");

        let text = match self.backend_type {
            BackendType::Ollama => self.ollama_generate(model, &request.prompt).await?,
            _ => self.chat_completion(model, &request.prompt).await?,
        };
        Ok(BackendOutput { text })
    }
}
