//! Executors, one implementation per resource kind.

use crate::backend::{Backend, BackendRequest};
use crate::error::ApiError;
use crate::executor::prompt::{compose, mentions_any, normalize_input, render};
use crate::schedule::TaskResult;
use crate::types::Namespace;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-call parameters.
#[derive(Debug, Clone, Default)]
pub struct ExecutionParams {
    /// Extra placeholder bindings. `request` and `input` are always bound to the
    /// normalized request and cannot be overridden here.
    pub variables: BTreeMap<String, String>,
    pub model: Option<String>,
    pub workdir: Option<PathBuf>,
    /// Bound on the backend call
    pub timeout: Option<Duration>,
}

impl ExecutionParams {
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    fn bindings(&self, request: &str) -> BTreeMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("request".to_string(), request.to_string());
        vars.insert("input".to_string(), request.to_string());
        vars
    }
}

/// A ready-to-run unit bound to one resource.
///
/// Executors hold no per-call state: one instance may serve many concurrent calls.
#[async_trait]
pub trait Executor: Send + Sync {
    fn namespace(&self) -> &str;

    /// Short kind label for logs and listings
    fn kind(&self) -> &'static str;

    /// Run the request. Never panics on expected failures; they come back as a
    /// failed `TaskResult`.
    async fn execute(&self, request: &str, params: &ExecutionParams) -> TaskResult;
}

/// Send `prompt` to `backend` under the params' timeout and time the call.
async fn call_backend(
    namespace: &str,
    backend: &dyn Backend,
    prompt: String,
    params: &ExecutionParams,
) -> TaskResult {
    let started = Instant::now();
    let request = BackendRequest {
        prompt,
        model: params.model.clone(),
        workdir: params.workdir.clone(),
        timeout: params.timeout,
    };
    debug!(namespace, backend = backend.name(), "Dispatching to backend");

    let outcome = match params.timeout {
        Some(limit) => match tokio::time::timeout(limit, backend.execute(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::BackendTimeout(limit.as_secs())),
        },
        None => backend.execute(request).await,
    };

    match outcome {
        Ok(output) => TaskResult::succeeded(namespace, output.text, started.elapsed()),
        Err(ApiError::BackendFailed(message)) => {
            TaskResult::failed(Some(namespace.to_string()), message, started.elapsed())
        }
        Err(e) => TaskResult::failed(Some(namespace.to_string()), e.to_string(), started.elapsed()),
    }
}

/// Skills, agents, and prompt templates: system text plus a rendered user template.
pub struct TemplateExecutor {
    namespace: Namespace,
    kind: &'static str,
    system: Option<String>,
    template: Option<String>,
    backend: Arc<dyn Backend>,
}

impl TemplateExecutor {
    pub fn new(
        namespace: impl Into<Namespace>,
        kind: &'static str,
        system: Option<String>,
        template: Option<String>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            system,
            template,
            backend,
        }
    }

    /// The exact prompt a request turns into.
    pub fn render_prompt(&self, request: &str, params: &ExecutionParams) -> String {
        let request = normalize_input(request);
        let vars = params.bindings(&request);
        let system = self.system.as_deref().map(|s| render(s, &vars));
        let user = match &self.template {
            Some(template) => render(template, &vars),
            None => request,
        };
        compose(system.as_deref(), &user)
    }
}

#[async_trait]
impl Executor for TemplateExecutor {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn execute(&self, request: &str, params: &ExecutionParams) -> TaskResult {
        let prompt = self.render_prompt(request, params);
        call_backend(&self.namespace, self.backend.as_ref(), prompt, params).await
    }
}

/// Canned commands: the body is the prompt; the request fills its placeholders
/// or, when the body has none, follows it as arguments.
pub struct CommandExecutor {
    namespace: Namespace,
    body: String,
    backend: Arc<dyn Backend>,
}

impl CommandExecutor {
    pub fn new(namespace: impl Into<Namespace>, body: String, backend: Arc<dyn Backend>) -> Self {
        Self {
            namespace: namespace.into(),
            body,
            backend,
        }
    }

    pub fn render_prompt(&self, request: &str, params: &ExecutionParams) -> String {
        let request = normalize_input(request);
        let vars = params.bindings(&request);
        let rendered = render(&self.body, &vars);
        if mentions_any(&self.body, &["request", "input"]) || request.trim().is_empty() {
            rendered
        } else {
            compose(Some(&rendered), &request)
        }
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> &'static str {
        "command"
    }

    async fn execute(&self, request: &str, params: &ExecutionParams) -> TaskResult {
        let prompt = self.render_prompt(request, params);
        call_backend(&self.namespace, self.backend.as_ref(), prompt, params).await
    }
}

/// Backend-kind resources: the normalized request goes to the named backend untouched.
pub struct PassthroughExecutor {
    namespace: Namespace,
    backend: Arc<dyn Backend>,
}

impl PassthroughExecutor {
    pub fn new(namespace: impl Into<Namespace>, backend: Arc<dyn Backend>) -> Self {
        Self {
            namespace: namespace.into(),
            backend,
        }
    }
}

#[async_trait]
impl Executor for PassthroughExecutor {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> &'static str {
        "backend"
    }

    async fn execute(&self, request: &str, params: &ExecutionParams) -> TaskResult {
        let prompt = normalize_input(request);
        call_backend(&self.namespace, self.backend.as_ref(), prompt, params).await
    }
}

/// Stands in for a resource that could not be prepared; fails every call.
pub struct FailingExecutor {
    namespace: Namespace,
    reason: String,
}

impl FailingExecutor {
    pub fn new(namespace: impl Into<Namespace>, reason: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Executor for FailingExecutor {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> &'static str {
        "failing"
    }

    async fn execute(&self, _request: &str, _params: &ExecutionParams) -> TaskResult {
        TaskResult::failed(Some(self.namespace.clone()), self.reason.clone(), Duration::ZERO)
    }
}
