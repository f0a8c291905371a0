//! Executors: resources bound to their content and a backend.

pub mod factory;
pub mod kinds;
pub mod prompt;

pub use factory::ExecutorFactory;
pub use kinds::{
    CommandExecutor, ExecutionParams, Executor, FailingExecutor, PassthroughExecutor,
    TemplateExecutor,
};
pub use prompt::{normalize_input, render, REQUEST_MARKER};
