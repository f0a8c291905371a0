//! Orchestrator: owns one of every component and exposes the entry points.

use crate::backend::{Backend, BackendRegistry};
use crate::config::WeftConfig;
use crate::error::ApiError;
use crate::executor::{ExecutionParams, ExecutorFactory};
use crate::intent::{Intent, IntentAnalyzer, KeywordIntentAnalyzer};
use crate::resource::{
    ContentProvider, MarkdownContentProvider, RegistrySettings, RegistryState, ResourceContent,
    ResourceRegistry,
};
use crate::router::ExecutionRouter;
use crate::schedule::{
    parse_batch, BatchResult, CancellationHandle, ParallelScheduler, SchedulerConfig, Task,
    TaskOptions, TaskResult,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Result of `handle`: one routed result, or a batch when the request split
/// into independent subtasks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    Single(TaskResult),
    Batch(BatchResult),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Single(result) => result.success,
            Outcome::Batch(batch) => batch.is_success(),
        }
    }
}

/// Overrides for a single request.
#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    /// Skip analysis and target this namespace
    pub resource: Option<String>,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub workdir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Assembles an `Orchestrator`; anything not supplied comes from the config.
pub struct OrchestratorBuilder {
    config: WeftConfig,
    workspace_root: PathBuf,
    registry_settings: Option<RegistrySettings>,
    provider: Option<Arc<dyn ContentProvider>>,
    analyzer: Option<Arc<dyn IntentAnalyzer>>,
    extra_backends: Vec<Arc<dyn Backend>>,
}

impl OrchestratorBuilder {
    pub fn registry_settings(mut self, settings: RegistrySettings) -> Self {
        self.registry_settings = Some(settings);
        self
    }

    pub fn content_provider(mut self, provider: Arc<dyn ContentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn IntentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Register a backend instance, replacing a configured one of the same name.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.extra_backends.push(backend);
        self
    }

    /// Build every component and load the registry (cache allowed).
    pub fn build(self) -> Result<Orchestrator, ApiError> {
        let config = self.config;
        config.validate()?;

        let settings = match self.registry_settings {
            Some(settings) => settings,
            None => config.registry.settings(&self.workspace_root)?,
        };
        let provider: Arc<dyn ContentProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(MarkdownContentProvider::new()),
        };
        let analyzer: Arc<dyn IntentAnalyzer> = match self.analyzer {
            Some(analyzer) => analyzer,
            None => Arc::new(KeywordIntentAnalyzer::new(
                config.intent.max_candidates,
                config.intent.min_score,
            )),
        };

        let mut backends =
            BackendRegistry::from_config(&config.backends, config.default_backend.clone());
        for backend in self.extra_backends {
            backends.register(backend);
        }
        let backends = Arc::new(backends);

        let registry = Arc::new(ResourceRegistry::new(settings, Arc::clone(&provider)));
        let state = registry.load(false)?;

        let factory = Arc::new(ExecutorFactory::new(
            Arc::clone(&registry),
            Arc::clone(&provider),
            Arc::clone(&backends),
        ));
        let router = Arc::new(ExecutionRouter::new(Arc::clone(&factory)));
        let scheduler = ParallelScheduler::new(
            Arc::clone(&factory),
            Arc::clone(&router),
            SchedulerConfig {
                max_workers: config.scheduler.max_workers,
                task_timeout: config.scheduler.task_timeout_secs.map(Duration::from_secs),
                skip_dependents_of_failed: config.scheduler.skip_dependents_of_failed,
                ..SchedulerConfig::default()
            },
        );

        info!(
            workspace = %self.workspace_root.display(),
            resources = state.resource_count,
            source = ?state.source,
            "Orchestrator initialized"
        );

        Ok(Orchestrator {
            config,
            workspace_root: self.workspace_root,
            provider,
            registry,
            backends,
            factory,
            router,
            scheduler,
            analyzer,
        })
    }
}

pub struct Orchestrator {
    config: WeftConfig,
    workspace_root: PathBuf,
    provider: Arc<dyn ContentProvider>,
    registry: Arc<ResourceRegistry>,
    backends: Arc<BackendRegistry>,
    factory: Arc<ExecutorFactory>,
    router: Arc<ExecutionRouter>,
    scheduler: ParallelScheduler,
    analyzer: Arc<dyn IntentAnalyzer>,
}

impl Orchestrator {
    pub fn builder(config: WeftConfig, workspace_root: impl Into<PathBuf>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            workspace_root: workspace_root.into(),
            registry_settings: None,
            provider: None,
            analyzer: None,
            extra_backends: Vec::new(),
        }
    }

    /// Build from configuration alone.
    pub fn init(config: WeftConfig, workspace_root: &Path) -> Result<Self, ApiError> {
        Self::builder(config, workspace_root).build()
    }

    pub fn analyze(&self, request: &str) -> Intent {
        self.analyzer.analyze(request, &self.registry)
    }

    /// Analyze and run one request. Independent subtasks run as one level-0
    /// batch; everything else goes through the router.
    pub async fn handle(&self, request: &str) -> Result<Outcome, ApiError> {
        self.handle_with(request, &HandleOptions::default()).await
    }

    pub async fn handle_with(
        &self,
        request: &str,
        options: &HandleOptions,
    ) -> Result<Outcome, ApiError> {
        let params = ExecutionParams {
            model: options.model.clone(),
            workdir: options.workdir.clone(),
            timeout: options
                .timeout
                .or(self.scheduler.config().task_timeout),
            ..ExecutionParams::default()
        };

        let intent = match &options.resource {
            Some(namespace) => {
                if !self.registry.exists(namespace) {
                    return Err(ApiError::ResourceNotFound(namespace.clone()));
                }
                Intent::new(request).with_entity(namespace.clone()).finalize()
            }
            None => self.analyze(request),
        };

        if intent.enable_parallel && options.resource.is_none() {
            info!(
                subtasks = intent.subtasks.len(),
                reasoning = %intent.parallel_reasoning,
                "Request split into parallel subtasks"
            );
            let task_options = TaskOptions {
                backend: options.backend.clone(),
                model: options.model.clone(),
                workdir: options.workdir.clone(),
                timeout: options.timeout,
                retries: 0,
            };
            let tasks = intent
                .subtasks
                .iter()
                .enumerate()
                .map(|(index, subtask)| {
                    Task::for_intent(format!("subtask-{}", index + 1), self.analyze(subtask))
                        .with_options(task_options.clone())
                })
                .collect();
            return Ok(Outcome::Batch(self.scheduler.execute(tasks).await?));
        }

        let result = self
            .router
            .route_with(&intent, &params, options.backend.as_deref())
            .await;
        Ok(Outcome::Single(result))
    }

    /// Parse task blocks and schedule them. Blocks naming a `resource` target it
    /// directly; the rest are targeted through intent analysis.
    pub async fn submit_batch(&self, text: &str) -> Result<BatchResult, ApiError> {
        self.submit_batch_with(text, self.scheduler.config().max_workers)
            .await
    }

    pub async fn submit_batch_with(
        &self,
        text: &str,
        max_workers: usize,
    ) -> Result<BatchResult, ApiError> {
        let blocks = parse_batch(text)?;
        let tasks: Vec<Task> = blocks
            .into_iter()
            .map(|block| {
                let task = match block.resource {
                    Some(namespace) => Task::for_resource(block.id, namespace, block.content),
                    None => Task::for_intent(block.id, self.analyze(&block.content)),
                };
                task.with_dependencies(block.dependencies)
                    .with_options(block.options)
            })
            .collect();
        self.scheduler.execute_tasks(tasks, max_workers).await
    }

    /// Parsed content of a registered resource.
    pub fn content(&self, namespace: &str) -> Result<ResourceContent, ApiError> {
        let metadata = self.registry.get_or_error(namespace)?;
        self.provider.load(&metadata.source_path)
    }

    /// Force a full scan and drop cached executors built from the old state.
    pub fn rescan(&self) -> Result<RegistryState, ApiError> {
        let state = self.registry.load(true)?;
        self.factory.clear();
        Ok(state)
    }

    /// Delete the persisted cache. The in-memory registry is untouched.
    pub fn invalidate_cache(&self) -> Result<(), ApiError> {
        self.registry.invalidate()
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.scheduler.cancellation_handle()
    }

    /// Stop scheduling and release cached executors.
    pub fn teardown(self) {
        self.scheduler.cancellation_handle().cancel();
        self.factory.clear();
        info!(workspace = %self.workspace_root.display(), "Orchestrator torn down");
    }

    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    pub fn factory(&self) -> &Arc<ExecutorFactory> {
        &self.factory
    }

    pub fn router(&self) -> &Arc<ExecutionRouter> {
        &self.router
    }
}
