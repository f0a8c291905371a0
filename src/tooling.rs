//! Tooling
//!
//! Command-line surface over the orchestrator and the text formatters it uses.

pub mod cli;
pub mod format;

pub use cli::{
    init, resolve_config, BackendCommands, Cli, CliContext, CommandOutput, Commands,
    ResourceCommands,
};
