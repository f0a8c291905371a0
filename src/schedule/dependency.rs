//! Wave partitioning of a task batch.

use crate::error::ApiError;
use crate::schedule::task::{ParallelGroup, Task};
use std::collections::{HashMap, HashSet};

/// Partitions tasks into ordered waves of mutually independent tasks.
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    /// Level 0 holds tasks without in-batch dependencies; each later level holds
    /// every task whose dependencies all sit in earlier levels. Dependencies on
    /// ids outside the batch are ignored. Submission order is kept within a level.
    pub fn group(tasks: Vec<Task>) -> Result<Vec<ParallelGroup>, ApiError> {
        let mut ids: HashSet<&str> = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(ApiError::InvalidBatch(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        // In-batch dependencies only.
        let pending_deps: Vec<Vec<String>> = tasks
            .iter()
            .map(|task| {
                task.dependencies
                    .iter()
                    .filter(|dep| ids.contains(dep.as_str()))
                    .cloned()
                    .collect()
            })
            .collect();

        let mut placed: HashMap<String, usize> = HashMap::with_capacity(tasks.len());
        let mut remaining: Vec<(Task, Vec<String>)> = tasks.into_iter().zip(pending_deps).collect();
        let mut groups: Vec<ParallelGroup> = Vec::new();

        while !remaining.is_empty() {
            let level = groups.len();
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|(_, deps)| deps.iter().all(|dep| placed.contains_key(dep)));

            if ready.is_empty() {
                let stuck = blocked.into_iter().map(|(task, _)| task.id).collect();
                return Err(ApiError::DependencyCycle(stuck));
            }

            for (task, _) in &ready {
                placed.insert(task.id.clone(), level);
            }
            groups.push(ParallelGroup {
                level,
                tasks: ready.into_iter().map(|(task, _)| task).collect(),
            });
            remaining = blocked;
        }

        Ok(groups)
    }
}
