//! Execution router: one intent to one result, degrading through candidates.

use crate::executor::{ExecutionParams, ExecutorFactory};
use crate::intent::Intent;
use crate::resource::ResourceRegistry;
use crate::schedule::TaskResult;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Attempt counts for one namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl NamespaceStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Success-rate accounting. Recorded on every attempt, never read by routing.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    by_namespace: RwLock<HashMap<String, NamespaceStats>>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, namespace: &str, success: bool) {
        let mut map = self.by_namespace.write();
        let entry = map.entry(namespace.to_string()).or_default();
        entry.attempts += 1;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
    }

    pub fn get(&self, namespace: &str) -> NamespaceStats {
        self.by_namespace
            .read()
            .get(namespace)
            .copied()
            .unwrap_or_default()
    }

    /// `None` until the namespace has been attempted.
    pub fn success_rate(&self, namespace: &str) -> Option<f64> {
        self.by_namespace
            .read()
            .get(namespace)
            .map(NamespaceStats::success_rate)
    }

    pub fn snapshot(&self) -> BTreeMap<String, NamespaceStats> {
        self.by_namespace
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

pub struct ExecutionRouter {
    factory: Arc<ExecutorFactory>,
    registry: Arc<ResourceRegistry>,
    stats: ExecutionStats,
}

impl ExecutionRouter {
    pub fn new(factory: Arc<ExecutorFactory>) -> Self {
        let registry = Arc::clone(factory.registry());
        Self {
            factory,
            registry,
            stats: ExecutionStats::new(),
        }
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Route with default parameters and backend resolution.
    pub async fn route(&self, intent: &Intent) -> TaskResult {
        self.route_with(intent, &ExecutionParams::default(), None)
            .await
    }

    /// Try the entity, then candidates by descending score, each at most once.
    /// Unavailable candidates are skipped. The first success wins; otherwise the
    /// result names the last attempted candidate's failure.
    pub async fn route_with(
        &self,
        intent: &Intent,
        params: &ExecutionParams,
        backend: Option<&str>,
    ) -> TaskResult {
        let started = Instant::now();
        let try_list = intent.try_list();
        if try_list.is_empty() {
            warn!(request = %intent.raw_request, "No candidate resources");
            return TaskResult::failed(None, "no candidate resources", started.elapsed());
        }

        let mut skipped: Vec<String> = Vec::new();
        let mut last_failure: Option<TaskResult> = None;

        for namespace in &try_list {
            if let Some(reason) = self.registry.availability(namespace).reason(namespace) {
                debug!(namespace = %namespace, reason = %reason, "Skipping unavailable candidate");
                skipped.push(reason);
                continue;
            }
            let Some(executor) = self.factory.create_executor_with_backend(namespace, backend)
            else {
                skipped.push(format!("resource '{}' became unavailable", namespace));
                continue;
            };

            debug!(namespace = %namespace, "Routing attempt");
            let result = executor.execute(&intent.raw_request, params).await;
            self.stats.record(namespace, result.success);

            if result.success {
                info!(
                    namespace = %namespace,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Routed request"
                );
                return result;
            }
            warn!(
                namespace = %namespace,
                error = result.error.as_deref().unwrap_or_default(),
                "Candidate failed, falling back"
            );
            last_failure = Some(result);
        }

        match last_failure {
            Some(mut result) => {
                let namespace = result.namespace.clone().unwrap_or_default();
                let reason = result.error.take().unwrap_or_default();
                result.error = Some(format!(
                    "all candidates failed; last attempted '{}': {}",
                    namespace, reason
                ));
                result.duration_seconds = started.elapsed().as_secs_f64();
                result
            }
            None => TaskResult::failed(
                None,
                format!("no available candidate resources ({})", skipped.join("; ")),
                started.elapsed(),
            ),
        }
    }
}
