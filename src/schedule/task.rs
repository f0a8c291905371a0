//! Task, result, and wave types.

use crate::intent::Intent;
use crate::types::{Namespace, TaskId};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Per-task overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub workdir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Extra runs after a failure
    pub retries: u32,
}

/// What a task runs against.
#[derive(Debug, Clone)]
pub enum TaskTarget {
    /// A namespace supplied directly
    Resource(Namespace),
    /// Resolved at run time through the router
    Intent(Intent),
}

/// One unit of batch work. Immutable once scheduled.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub target: TaskTarget,
    pub request: String,
    /// Ids within the same batch
    pub dependencies: Vec<TaskId>,
    pub options: TaskOptions,
}

impl Task {
    pub fn for_resource(
        id: impl Into<TaskId>,
        namespace: impl Into<Namespace>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target: TaskTarget::Resource(namespace.into()),
            request: request.into(),
            dependencies: Vec::new(),
            options: TaskOptions::default(),
        }
    }

    pub fn for_intent(id: impl Into<TaskId>, intent: Intent) -> Self {
        Self {
            id: id.into(),
            request: intent.raw_request.clone(),
            target: TaskTarget::Intent(intent),
            dependencies: Vec::new(),
            options: TaskOptions::default(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Namespace when targeted directly.
    pub fn namespace(&self) -> Option<&str> {
        match &self.target {
            TaskTarget::Resource(namespace) => Some(namespace),
            TaskTarget::Intent(_) => None,
        }
    }
}

/// Outcome of one execution. `error` is present iff `!success`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Namespace that produced the result; absent when nothing was attempted
    pub namespace: Option<Namespace>,
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub attempts: u32,
}

impl TaskResult {
    pub fn succeeded(namespace: impl Into<Namespace>, output: String, duration: Duration) -> Self {
        Self {
            task_id: None,
            namespace: Some(namespace.into()),
            success: true,
            output,
            error: None,
            duration_seconds: duration.as_secs_f64(),
            attempts: 1,
        }
    }

    pub fn failed(namespace: Option<Namespace>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id: None,
            namespace,
            success: false,
            output: String::new(),
            error: Some(error.into()),
            duration_seconds: duration.as_secs_f64(),
            attempts: 1,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

/// One wave of mutually independent tasks.
#[derive(Debug, Clone)]
pub struct ParallelGroup {
    pub level: usize,
    pub tasks: Vec<Task>,
}

/// Aggregate of a scheduled batch. Owns its results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub total_tasks: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration_seconds: f64,
    /// Completion order
    pub task_results: Vec<TaskResult>,
    pub groups: usize,
    pub cancelled: bool,
}

impl BatchResult {
    /// True only when every submitted task ran and succeeded.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.successful == self.total_tasks
    }

    pub fn result_for(&self, task_id: &str) -> Option<&TaskResult> {
        self.task_results
            .iter()
            .find(|result| result.task_id.as_deref() == Some(task_id))
    }

    pub(crate) fn record(&mut self, result: TaskResult) {
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.task_results.push(result);
    }
}
