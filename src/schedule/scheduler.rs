//! Parallel Scheduler
//!
//! Runs dependency waves in level order with a barrier between waves. Within a
//! wave up to `max_workers` tasks run concurrently; the rest wait on a semaphore.

use crate::error::ApiError;
use crate::executor::{ExecutionParams, ExecutorFactory};
use crate::router::ExecutionRouter;
use crate::schedule::dependency::DependencyAnalyzer;
use crate::schedule::task::{BatchResult, Task, TaskResult, TaskTarget};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrent tasks per wave
    pub max_workers: usize,
    /// Default per-task timeout; tasks may override
    pub task_timeout: Option<Duration>,
    /// Record dependents of a failed task as failed without running them
    pub skip_dependents_of_failed: bool,
    /// Pause before re-running a failed task
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout: None,
            skip_dependents_of_failed: true,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Cancels the batches running when `cancel` is called. In-flight tasks finish;
/// queued tasks and later waves of those batches never start. Batches started
/// afterwards are unaffected.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    generation: Arc<AtomicU64>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Token for a batch starting now.
    fn token(&self) -> BatchToken {
        BatchToken {
            generation: Arc::clone(&self.generation),
            started_at: self.generation.load(Ordering::SeqCst),
        }
    }
}

/// Cancellation view of one batch: set once the handle is cancelled after the
/// batch started.
#[derive(Debug, Clone)]
struct BatchToken {
    generation: Arc<AtomicU64>,
    started_at: u64,
}

impl BatchToken {
    fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.started_at
    }
}

pub struct ParallelScheduler {
    factory: Arc<ExecutorFactory>,
    router: Arc<ExecutionRouter>,
    config: SchedulerConfig,
    cancellation: CancellationHandle,
}

impl ParallelScheduler {
    pub fn new(
        factory: Arc<ExecutorFactory>,
        router: Arc<ExecutionRouter>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            factory,
            router,
            config,
            cancellation: CancellationHandle::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Handle that cancels batches run by this scheduler.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Run with the configured worker limit.
    pub async fn execute(&self, tasks: Vec<Task>) -> Result<BatchResult, ApiError> {
        self.execute_tasks(tasks, self.config.max_workers).await
    }

    /// Run a batch. Structural errors (no tasks, duplicate ids, cycles) fail
    /// before anything runs; task failures are recorded in the result.
    pub async fn execute_tasks(
        &self,
        tasks: Vec<Task>,
        max_workers: usize,
    ) -> Result<BatchResult, ApiError> {
        if tasks.is_empty() {
            return Err(ApiError::InvalidBatch("batch contains no tasks".to_string()));
        }
        let token = self.cancellation.token();
        let started = Instant::now();
        let total_tasks = tasks.len();
        let groups = DependencyAnalyzer::group(tasks)?;
        let max_workers = max_workers.max(1);

        info!(
            tasks = total_tasks,
            groups = groups.len(),
            max_workers,
            "Batch scheduled"
        );

        let mut batch = BatchResult {
            total_tasks,
            groups: groups.len(),
            ..BatchResult::default()
        };
        let mut failed_ids: HashSet<String> = HashSet::new();

        for group in groups {
            if token.is_cancelled() {
                batch.cancelled = true;
                break;
            }
            let wave_started = Instant::now();
            info!(level = group.level, tasks = group.tasks.len(), "Wave started");

            let semaphore = Arc::new(Semaphore::new(max_workers));
            let mut running: JoinSet<Option<TaskResult>> = JoinSet::new();

            for task in group.tasks {
                let failed_dependency = task
                    .dependencies
                    .iter()
                    .find(|dep| failed_ids.contains(dep.as_str()))
                    .cloned();
                if let (true, Some(dependency)) =
                    (self.config.skip_dependents_of_failed, failed_dependency)
                {
                    warn!(task_id = %task.id, dependency = %dependency, "Skipping task with failed dependency");
                    let mut skipped = TaskResult::failed(
                        task.namespace().map(str::to_string),
                        format!("skipped: dependency '{}' failed", dependency),
                        Duration::ZERO,
                    )
                    .with_task_id(task.id.clone());
                    skipped.attempts = 0;
                    failed_ids.insert(task.id.clone());
                    batch.record(skipped);
                    continue;
                }

                let semaphore = Arc::clone(&semaphore);
                let factory = Arc::clone(&self.factory);
                let router = Arc::clone(&self.router);
                let token = token.clone();
                let config = self.config.clone();
                running.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    if token.is_cancelled() {
                        debug!(task_id = %task.id, "Task not started: batch cancelled");
                        return None;
                    }
                    let task_id = task.id.clone();
                    let namespace = task.namespace().map(str::to_string);
                    let outcome = AssertUnwindSafe(run_task(&factory, &router, &config, &task))
                        .catch_unwind()
                        .await;
                    Some(match outcome {
                        Ok(result) => result,
                        Err(_) => {
                            error!(task_id = %task_id, "Task panicked");
                            TaskResult::failed(namespace, "task panicked", Duration::ZERO)
                                .with_task_id(task_id)
                        }
                    })
                });
            }

            while let Some(joined) = running.join_next().await {
                let result = match joined {
                    Ok(Some(result)) => result,
                    Ok(None) => {
                        batch.cancelled = true;
                        continue;
                    }
                    Err(e) => {
                        error!(error = %e, "Task join failed");
                        TaskResult::failed(None, format!("task aborted: {}", e), Duration::ZERO)
                    }
                };
                info!(
                    task_id = result.task_id.as_deref().unwrap_or_default(),
                    namespace = result.namespace.as_deref().unwrap_or_default(),
                    success = result.success,
                    attempts = result.attempts,
                    "Task completed"
                );
                if !result.success {
                    if let Some(task_id) = &result.task_id {
                        failed_ids.insert(task_id.clone());
                    }
                }
                batch.record(result);
            }

            info!(
                level = group.level,
                duration_ms = wave_started.elapsed().as_millis() as u64,
                "Wave finished"
            );
        }

        if token.is_cancelled() && batch.task_results.len() < total_tasks {
            batch.cancelled = true;
        }
        batch.total_duration_seconds = started.elapsed().as_secs_f64();
        info!(
            successful = batch.successful,
            failed = batch.failed,
            cancelled = batch.cancelled,
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch finished"
        );
        Ok(batch)
    }
}

/// Run one task with retries. Unavailable resources are never retried.
async fn run_task(
    factory: &ExecutorFactory,
    router: &ExecutionRouter,
    config: &SchedulerConfig,
    task: &Task,
) -> TaskResult {
    let params = ExecutionParams {
        model: task.options.model.clone(),
        workdir: task.options.workdir.clone(),
        timeout: task.options.timeout.or(config.task_timeout),
        ..ExecutionParams::default()
    };
    let backend = task.options.backend.as_deref();
    let started = Instant::now();
    let mut attempts = 0;

    let mut result = loop {
        attempts += 1;
        let result = match &task.target {
            TaskTarget::Resource(namespace) => {
                match factory.create_executor_with_backend(namespace, backend) {
                    Some(executor) => executor.execute(&task.request, &params).await,
                    None => {
                        let reason = factory
                            .registry()
                            .availability(namespace)
                            .reason(namespace)
                            .unwrap_or_else(|| format!("resource '{}' is unavailable", namespace));
                        break TaskResult::failed(Some(namespace.clone()), reason, started.elapsed());
                    }
                }
            }
            TaskTarget::Intent(intent) => router.route_with(intent, &params, backend).await,
        };

        if result.success || attempts > task.options.retries {
            break result;
        }
        debug!(
            task_id = %task.id,
            attempt = attempts,
            error = result.error.as_deref().unwrap_or_default(),
            "Retrying task"
        );
        if !config.retry_delay.is_zero() {
            sleep(config.retry_delay).await;
        }
    };

    result.attempts = attempts;
    result.duration_seconds = started.elapsed().as_secs_f64();
    result.with_task_id(task.id.clone())
}
