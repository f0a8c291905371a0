//! Executor factory: namespace to cached, ready-to-run executor.

use crate::backend::BackendRegistry;
use crate::concurrency::SlotMap;
use crate::executor::kinds::{
    CommandExecutor, Executor, FailingExecutor, PassthroughExecutor, TemplateExecutor,
};
use crate::resource::content::BODY_SECTION;
use crate::resource::{
    ContentProvider, ResourceContent, ResourceMetadata, ResourceRegistry, ResourceType,
    SYSTEM_SECTION, USER_TEMPLATE_SECTION,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ExecutorFactory {
    registry: Arc<ResourceRegistry>,
    provider: Arc<dyn ContentProvider>,
    backends: Arc<BackendRegistry>,
    executors: SlotMap<Arc<dyn Executor>>,
}

impl ExecutorFactory {
    pub fn new(
        registry: Arc<ResourceRegistry>,
        provider: Arc<dyn ContentProvider>,
        backends: Arc<BackendRegistry>,
    ) -> Self {
        Self {
            registry,
            provider,
            backends,
            executors: SlotMap::new(),
        }
    }

    /// Executor for `namespace` on its resolved backend.
    ///
    /// `None` when the resource is missing, disabled, or has an unsatisfied
    /// dependency. Repeated calls return the same instance.
    pub fn create_executor(&self, namespace: &str) -> Option<Arc<dyn Executor>> {
        self.create_executor_with_backend(namespace, None)
    }

    /// Like `create_executor`, with an explicit backend that beats the resource's
    /// declared one. Cached separately under `namespace@backend`.
    pub fn create_executor_with_backend(
        &self,
        namespace: &str,
        backend: Option<&str>,
    ) -> Option<Arc<dyn Executor>> {
        let availability = self.registry.availability(namespace);
        if let Some(reason) = availability.reason(namespace) {
            debug!(namespace, reason = %reason, "Executor not created");
            return None;
        }

        let key = match backend {
            Some(backend) => format!("{}@{}", namespace, backend),
            None => namespace.to_string(),
        };
        self.executors.get_or_try_insert_with(&key, || {
            let metadata = self.registry.get(namespace)?;
            Some(self.build(&metadata, backend))
        })
    }

    fn build(&self, metadata: &ResourceMetadata, backend: Option<&str>) -> Arc<dyn Executor> {
        let namespace = metadata.namespace.as_str();

        let content = match self.provider.load(&metadata.source_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(namespace, error = %e, "Resource content failed to parse");
                return Arc::new(FailingExecutor::new(namespace, e.to_string()));
            }
        };

        // Backend-kind resources name their engine; fall back to the resource name.
        let declared = match metadata.resource_type {
            ResourceType::Backend => metadata
                .backend
                .as_deref()
                .or(Some(metadata.name.as_str())),
            _ => metadata.backend.as_deref(),
        };
        let engine = match self.backends.resolve(backend, declared) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(namespace, error = %e, "No backend for resource");
                return Arc::new(FailingExecutor::new(namespace, e.to_string()));
            }
        };

        let executor: Arc<dyn Executor> = match metadata.resource_type {
            ResourceType::Skill | ResourceType::Agent | ResourceType::Prompt => {
                let (system, template) = template_parts(metadata.resource_type, &content);
                Arc::new(TemplateExecutor::new(
                    namespace,
                    metadata.resource_type.as_str(),
                    system,
                    template,
                    Arc::clone(&engine),
                ))
            }
            ResourceType::Command => {
                let body = content
                    .section(USER_TEMPLATE_SECTION)
                    .or_else(|| content.section(BODY_SECTION))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                Arc::new(CommandExecutor::new(namespace, body, Arc::clone(&engine)))
            }
            ResourceType::Backend => {
                Arc::new(PassthroughExecutor::new(namespace, Arc::clone(&engine)))
            }
        };

        info!(
            namespace,
            kind = executor.kind(),
            backend = engine.name(),
            "Executor created"
        );
        executor
    }

    /// Drop every cached executor. Executors already handed out stay usable.
    pub fn clear(&self) {
        self.executors.clear();
        debug!("Executor cache cleared");
    }

    pub fn cached_count(&self) -> usize {
        self.executors.len()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }
}

/// System text and user template for template-style resources. Agents with no
/// system section use their body.
fn template_parts(kind: ResourceType, content: &ResourceContent) -> (Option<String>, Option<String>) {
    let system = content
        .section(SYSTEM_SECTION)
        .or_else(|| match kind {
            ResourceType::Agent => content.section(BODY_SECTION),
            _ => None,
        })
        .map(|text| text.trim().to_string());
    let template = content
        .section(USER_TEMPLATE_SECTION)
        .map(|text| text.trim().to_string());
    (system, template)
}
