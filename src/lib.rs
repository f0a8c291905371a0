//! Weft: Natural-Language Task Orchestration
//!
//! Discovers skills, agents, commands, and prompts declared as markdown files in
//! a workspace, classifies free-text requests against them, and runs the chosen
//! resource on a pluggable backend. Batches of tasks run in dependency waves
//! with bounded parallelism.

pub mod backend;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod executor;
pub mod intent;
pub mod logging;
pub mod orchestrator;
pub mod resource;
pub mod router;
pub mod schedule;
pub mod tooling;
pub mod types;

pub use backend::{Backend, BackendConfig, BackendRegistry, BackendRequest, BackendType};
pub use config::{ConfigLoader, WeftConfig};
pub use error::ApiError;
pub use executor::{ExecutionParams, Executor, ExecutorFactory};
pub use intent::{Intent, IntentAnalyzer, KeywordIntentAnalyzer};
pub use orchestrator::{HandleOptions, Orchestrator, OrchestratorBuilder, Outcome};
pub use resource::{
    ContentProvider, MarkdownContentProvider, ResourceMetadata, ResourceRegistry, ResourceType,
};
pub use router::ExecutionRouter;
pub use schedule::{
    parse_batch, BatchResult, CancellationHandle, ParallelScheduler, Task, TaskResult,
};
pub use types::{ContentHash, Namespace, TaskId};
