//! CLI Tooling
//!
//! Command-line interface for routing requests, submitting batches, and
//! inspecting the resource registry and backends of one workspace.

use crate::backend::build_backend;
use crate::config::{ConfigLoader, WeftConfig};
use crate::error::ApiError;
use crate::logging::init_logging;
use crate::orchestrator::{HandleOptions, Orchestrator, Outcome};
use crate::resource::ResourceType;
use crate::tooling::format::{
    format_backend_list_text, format_backend_validation_text, format_batch_text,
    format_intent_text, format_registry_state_text, format_resource_list_text,
    format_resource_show_text, format_task_result_text,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Weft CLI - natural-language task orchestration
#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Route requests to skills, agents, commands, and prompts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging to stderr (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a request and run it on the best resource
    Run {
        /// Request text
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
        /// Target this namespace instead of analyzing the request
        #[arg(long)]
        resource: Option<String>,
        /// Backend override
        #[arg(long)]
        backend: Option<String>,
        /// Model override
        #[arg(long)]
        model: Option<String>,
        /// Working directory for command backends
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run a batch of task blocks from a file ("-" reads stdin)
    Batch {
        file: PathBuf,
        /// Concurrent tasks per wave (default from config)
        #[arg(long)]
        max_workers: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show how a request would be classified without running it
    Intent {
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Inspect the resource registry
    Resources {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Inspect configured backends
    Backends {
        #[command(subcommand)]
        command: BackendCommands,
    },
}

#[derive(Subcommand)]
pub enum ResourceCommands {
    /// List registered resources
    List {
        /// Filter by type (skill, agent, command, prompt, backend)
        #[arg(long = "type")]
        resource_type: Option<String>,
        /// Include disabled resources
        #[arg(long)]
        all: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one resource with its content sections
    Show {
        namespace: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Force a full rescan of resource sources
    Scan,
    /// Delete the persisted registry cache
    ClearCache,
}

#[derive(Subcommand)]
pub enum BackendCommands {
    /// List backends and whether they are usable
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate backend configuration
    Validate {
        /// Backend name (default: all configured backends)
        name: Option<String>,
    },
}

/// Rendered command output and whether the command itself succeeded.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {}. Must be 'text' or 'json'",
                other
            ))),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// CLI context: loaded configuration plus a ready orchestrator.
pub struct CliContext {
    orchestrator: Orchestrator,
}

/// Canonical workspace root and loaded configuration with the logging flags
/// folded in.
pub fn resolve_config(cli: &Cli) -> Result<(PathBuf, WeftConfig), ApiError> {
    let workspace_root = dunce::canonicalize(&cli.workspace).map_err(|e| {
        ApiError::ConfigError(format!(
            "Workspace '{}' is not accessible: {}",
            cli.workspace.display(),
            e
        ))
    })?;

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(&workspace_root)?,
    };
    apply_log_flags(&mut config, cli, &workspace_root)?;
    Ok((workspace_root, config))
}

/// Resolve configuration, install the global log subscriber, and build the
/// context. Call once per process.
pub fn init(cli: &Cli) -> Result<CliContext, ApiError> {
    let (workspace_root, config) = resolve_config(cli)?;
    init_logging(Some(&config.logging))?;
    CliContext::from_config(config, &workspace_root)
}

impl CliContext {
    /// Build a context without touching global logging state.
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let (workspace_root, config) = resolve_config(cli)?;
        Self::from_config(config, &workspace_root)
    }

    pub fn from_config(config: WeftConfig, workspace_root: &Path) -> Result<Self, ApiError> {
        let orchestrator = Orchestrator::init(config, workspace_root)?;
        Ok(Self { orchestrator })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        info!(
            command = command_name(command),
            ok = result.as_ref().map(|o| o.success).unwrap_or(false),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Run {
                request,
                resource,
                backend,
                model,
                workdir,
                timeout,
                format,
            } => {
                let format = OutputFormat::parse(format)?;
                let options = HandleOptions {
                    resource: resource.clone(),
                    backend: backend.clone(),
                    model: model.clone(),
                    workdir: workdir.clone(),
                    timeout: timeout.map(Duration::from_secs),
                };
                self.handle_run(&request.join(" "), &options, format).await
            }
            Commands::Batch {
                file,
                max_workers,
                format,
            } => {
                let format = OutputFormat::parse(format)?;
                self.handle_batch(file, *max_workers, format).await
            }
            Commands::Intent { request, format } => {
                let format = OutputFormat::parse(format)?;
                let intent = self.orchestrator.analyze(&request.join(" "));
                let text = match format {
                    OutputFormat::Text => format_intent_text(&intent),
                    OutputFormat::Json => to_json(&intent)?,
                };
                Ok(CommandOutput::ok(text))
            }
            Commands::Resources { command } => self.handle_resources(command).map(CommandOutput::ok),
            Commands::Backends { command } => self.handle_backends(command),
        }
    }

    async fn handle_run(
        &self,
        request: &str,
        options: &HandleOptions,
        format: OutputFormat,
    ) -> Result<CommandOutput, ApiError> {
        let outcome = self.orchestrator.handle_with(request, options).await?;
        let success = outcome.is_success();
        let text = match (format, &outcome) {
            (OutputFormat::Json, _) => to_json(&outcome)?,
            (OutputFormat::Text, Outcome::Single(result)) => format_task_result_text(result),
            (OutputFormat::Text, Outcome::Batch(batch)) => format_batch_text(batch),
        };
        Ok(CommandOutput { text, success })
    }

    async fn handle_batch(
        &self,
        file: &Path,
        max_workers: Option<usize>,
        format: OutputFormat,
    ) -> Result<CommandOutput, ApiError> {
        let text = if file == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(file).map_err(|e| {
                ApiError::ConfigError(format!(
                    "Failed to read batch file {}: {}",
                    file.display(),
                    e
                ))
            })?
        };

        let max_workers =
            max_workers.unwrap_or(self.orchestrator.config().scheduler.max_workers);
        let batch = self.orchestrator.submit_batch_with(&text, max_workers).await?;
        let rendered = match format {
            OutputFormat::Text => format_batch_text(&batch),
            OutputFormat::Json => to_json(&batch)?,
        };
        Ok(CommandOutput {
            text: rendered,
            success: batch.is_success(),
        })
    }

    fn handle_resources(&self, command: &ResourceCommands) -> Result<String, ApiError> {
        let registry = self.orchestrator.registry();
        match command {
            ResourceCommands::List {
                resource_type,
                all,
                format,
            } => {
                let format = OutputFormat::parse(format)?;
                let resources = match resource_type {
                    Some(kind) => registry.list_by_type(kind.parse::<ResourceType>()?, !all),
                    None => registry
                        .list_all()
                        .into_iter()
                        .filter(|r| *all || r.enabled)
                        .collect(),
                };
                match format {
                    OutputFormat::Json => to_json(&resources),
                    OutputFormat::Text => {
                        let rows: Vec<_> = resources
                            .into_iter()
                            .map(|r| {
                                let availability = registry.availability(&r.namespace);
                                (r, availability)
                            })
                            .collect();
                        Ok(format_resource_list_text(&rows))
                    }
                }
            }
            ResourceCommands::Show { namespace, format } => {
                let format = OutputFormat::parse(format)?;
                let metadata = registry.get_or_error(namespace)?;
                let availability = registry.availability(namespace);
                let content = self.orchestrator.content(namespace)?;
                match format {
                    OutputFormat::Text => Ok(format_resource_show_text(
                        &metadata,
                        &availability,
                        Some(&content),
                    )),
                    OutputFormat::Json => {
                        let sections: serde_json::Map<String, serde_json::Value> = content
                            .sections
                            .iter()
                            .map(|(name, text)| (name.clone(), json!(text)))
                            .collect();
                        to_json(&json!({
                            "resource": metadata,
                            "available": availability.is_available(),
                            "unavailable_reason": availability.reason(namespace),
                            "metadata": content.metadata,
                            "sections": sections,
                        }))
                    }
                }
            }
            ResourceCommands::Scan => {
                let state = self.orchestrator.rescan()?;
                Ok(format_registry_state_text(&state, registry.scan_count()))
            }
            ResourceCommands::ClearCache => {
                self.orchestrator.invalidate_cache()?;
                Ok(match registry.cache_dir() {
                    Some(dir) => format!("Registry cache cleared: {}", dir.display()),
                    None => "Registry cache is disabled; nothing to clear.".to_string(),
                })
            }
        }
    }

    fn handle_backends(&self, command: &BackendCommands) -> Result<CommandOutput, ApiError> {
        let backends = self.orchestrator.backends();
        match command {
            BackendCommands::List { format } => {
                let format = OutputFormat::parse(format)?;
                let status = backends.status();
                let text = match format {
                    OutputFormat::Text => {
                        format_backend_list_text(&status, backends.default_backend())
                    }
                    OutputFormat::Json => to_json(&json!({
                        "default": backends.default_backend(),
                        "backends": status,
                    }))?,
                };
                Ok(CommandOutput::ok(text))
            }
            BackendCommands::Validate { name } => {
                let configured = &self.orchestrator.config().backends;
                let mut names: Vec<&String> = match name {
                    Some(name) => {
                        let (key, _) = configured.get_key_value(name).ok_or_else(|| {
                            ApiError::BackendNotConfigured(name.clone())
                        })?;
                        vec![key]
                    }
                    None => configured.keys().collect(),
                };
                names.sort();
                let results: Vec<(String, Result<(), String>)> = names
                    .into_iter()
                    .map(|name| {
                        let outcome = configured
                            .get(name)
                            .ok_or_else(|| format!("backend '{}' is not configured", name))
                            .and_then(|cfg| {
                                build_backend(name, cfg)
                                    .map(|_| ())
                                    .map_err(|e| e.to_string())
                            });
                        (name.clone(), outcome)
                    })
                    .collect();
                let success = results.iter().all(|(_, r)| r.is_ok());
                Ok(CommandOutput {
                    text: format_backend_validation_text(&results),
                    success,
                })
            }
        }
    }
}

/// Fold CLI logging flags into the loaded config. `--verbose` sends debug
/// output to stderr unless other flags say otherwise.
fn apply_log_flags(config: &mut WeftConfig, cli: &Cli, workspace: &Path) -> Result<(), ApiError> {
    let logging = &mut config.logging;
    if cli.verbose {
        logging.enabled = true;
        logging.level = "debug".to_string();
        logging.output = "stderr".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if logging.output.contains("file") {
        logging.file = Some(crate::logging::resolve_log_file_path(
            cli.log_file.clone(),
            logging.file.clone(),
            Some(workspace),
        )?);
    }
    Ok(())
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Run { .. } => "run",
        Commands::Batch { .. } => "batch",
        Commands::Intent { .. } => "intent",
        Commands::Resources { command } => match command {
            ResourceCommands::List { .. } => "resources.list",
            ResourceCommands::Show { .. } => "resources.show",
            ResourceCommands::Scan => "resources.scan",
            ResourceCommands::ClearCache => "resources.clear_cache",
        },
        Commands::Backends { command } => match command {
            BackendCommands::List { .. } => "backends.list",
            BackendCommands::Validate { .. } => "backends.validate",
        },
    }
}
