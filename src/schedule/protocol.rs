//! Batch task submission protocol.
//!
//! ```text
//! ---TASK---
//! id: build
//! dependencies: design, schema
//! ---CONTENT---
//! free text payload
//! ---END---
//! ```

use crate::error::ApiError;
use crate::schedule::task::TaskOptions;
use std::path::PathBuf;
use std::time::Duration;

pub const TASK_MARKER: &str = "---TASK---";
pub const CONTENT_MARKER: &str = "---CONTENT---";
pub const END_MARKER: &str = "---END---";

/// One decoded task block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBlock {
    pub id: String,
    /// Explicit target; otherwise the content goes through intent analysis
    pub resource: Option<String>,
    pub dependencies: Vec<String>,
    pub options: TaskOptions,
    pub content: String,
}

enum State {
    Outside,
    Header { start: usize, block: TaskBlock, has_id: bool },
    Content { start: usize, block: TaskBlock, has_id: bool, lines: Vec<String> },
}

/// Decode every task block in `text`. Blocks without an `id` get `task-<n>`
/// (1-based position). Text between blocks must be blank.
pub fn parse_batch(text: &str) -> Result<Vec<TaskBlock>, ApiError> {
    let mut blocks: Vec<TaskBlock> = Vec::new();
    let mut state = State::Outside;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let marker = raw.trim();

        state = match state {
            State::Outside => match marker {
                TASK_MARKER => State::Header {
                    start: line_no,
                    block: TaskBlock::default(),
                    has_id: false,
                },
                "" => State::Outside,
                _ => return Err(protocol(line_no, format!("expected {}", TASK_MARKER))),
            },
            State::Header {
                start,
                mut block,
                mut has_id,
            } => match marker {
                CONTENT_MARKER => State::Content {
                    start,
                    block,
                    has_id,
                    lines: Vec::new(),
                },
                TASK_MARKER | END_MARKER => {
                    return Err(protocol(line_no, format!("expected {}", CONTENT_MARKER)))
                }
                "" => State::Header { start, block, has_id },
                _ => {
                    if apply_header(&mut block, raw, line_no)? {
                        has_id = true;
                    }
                    State::Header { start, block, has_id }
                }
            },
            State::Content {
                start,
                mut block,
                has_id,
                mut lines,
            } => match marker {
                END_MARKER => {
                    block.content = lines.join("\n").trim().to_string();
                    if block.content.is_empty() {
                        return Err(protocol(start, "task content is empty".to_string()));
                    }
                    if !has_id {
                        block.id = format!("task-{}", blocks.len() + 1);
                    }
                    blocks.push(block);
                    State::Outside
                }
                TASK_MARKER => return Err(protocol(line_no, format!("expected {}", END_MARKER))),
                _ => {
                    lines.push(raw.to_string());
                    State::Content {
                        start,
                        block,
                        has_id,
                        lines,
                    }
                }
            },
        };
    }

    match state {
        State::Outside => Ok(blocks),
        State::Header { start, .. } | State::Content { start, .. } => {
            Err(protocol(start, "task block is not terminated".to_string()))
        }
    }
}

fn protocol(line: usize, reason: String) -> ApiError {
    ApiError::Protocol { line, reason }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Apply one `key: value` header. Returns true when it set the id.
fn apply_header(block: &mut TaskBlock, raw: &str, line: usize) -> Result<bool, ApiError> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| protocol(line, format!("expected 'key: value', got '{}'", raw.trim())))?;
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();

    match key.as_str() {
        "id" => {
            if value.is_empty() {
                return Err(protocol(line, "id cannot be empty".to_string()));
            }
            block.id = value.to_string();
            return Ok(true);
        }
        "backend" => block.options.backend = optional(value),
        "workdir" => block.options.workdir = optional(value).map(PathBuf::from),
        "model" => block.options.model = optional(value),
        "resource" => block.resource = optional(value),
        "timeout" => {
            block.options.timeout = match value {
                "" => None,
                _ => {
                    let secs: u64 = value.parse().map_err(|_| {
                        protocol(line, format!("timeout must be whole seconds, got '{}'", value))
                    })?;
                    if secs == 0 {
                        return Err(protocol(line, "timeout must be positive".to_string()));
                    }
                    Some(Duration::from_secs(secs))
                }
            }
        }
        "retry" => {
            block.options.retries = match value {
                "" => 0,
                _ => value.parse().map_err(|_| {
                    protocol(line, format!("retry must be a count, got '{}'", value))
                })?,
            }
        }
        "dependencies" => {
            block.dependencies = value
                .split(',')
                .map(str::trim)
                .filter(|dep| !dep.is_empty())
                .map(str::to_string)
                .collect()
        }
        other => return Err(protocol(line, format!("unknown key '{}'", other))),
    }
    Ok(false)
}
