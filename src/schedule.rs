//! Batch scheduling: tasks, wave partitioning, the parallel scheduler, and the
//! task block protocol.

pub mod dependency;
pub mod protocol;
pub mod scheduler;
pub mod task;

pub use dependency::DependencyAnalyzer;
pub use protocol::{parse_batch, TaskBlock};
pub use scheduler::{CancellationHandle, ParallelScheduler, SchedulerConfig};
pub use task::{BatchResult, ParallelGroup, Task, TaskOptions, TaskResult, TaskTarget};
