//! Command backend: spawn a CLI engine and feed the prompt through stdin.

use crate::backend::contract::{Backend, BackendOutput, BackendRequest};
use crate::backend::profile::BackendConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct CommandBackend {
    name: String,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    model: Option<String>,
}

impl CommandBackend {
    pub fn new(name: &str, config: &BackendConfig) -> Result<Self, ApiError> {
        let program = config
            .program
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                ApiError::BackendNotConfigured(format!("Backend '{}' has no program", name))
            })?;
        Ok(Self {
            name: name.to_string(),
            program,
            args: config.args.clone(),
            env: config.env.clone(),
            model: config.model.clone(),
        })
    }

    /// Arguments with `{model}` substituted. Arguments that reference the model are
    /// dropped when no model is known.
    fn render_args(&self, model: Option<&str>) -> Vec<String> {
        let model = model.or(self.model.as_deref());
        self.args
            .iter()
            .filter_map(|arg| match (arg.contains("{model}"), model) {
                (false, _) => Some(arg.clone()),
                (true, Some(model)) => Some(arg.replace("{model}", model)),
                (true, None) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Backend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: BackendRequest) -> Result<BackendOutput, ApiError> {
        let args = self.render_args(request.model.as_deref());
        debug!(backend = %self.name, program = %self.program, ?args, "Spawning backend process");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(workdir) = &request.workdir {
            command.current_dir(workdir);
        }

        let mut child = command.spawn().map_err(|e| {
            ApiError::BackendFailed(format!("failed to start '{}': {}", self.program, e))
        })?;

        // Feed stdin while draining stdout and stderr so neither side blocks on a full pipe.
        let stdin = child.stdin.take();
        let prompt = request.prompt.as_bytes();
        let write_prompt = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(prompt).await {
                    Ok(()) => {}
                    // The engine may exit without reading; its exit status tells the story.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                }
                // Dropping stdin closes it and signals end of prompt.
            }
            Ok(())
        };
        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());

        let output = output
            .map_err(|e| ApiError::BackendFailed(format!("failed to wait for process: {}", e)))?;
        written.map_err(|e| ApiError::BackendFailed(format!("failed to write prompt: {}", e)))?;

        if output.status.success() {
            Ok(BackendOutput {
                text: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Err(ApiError::BackendFailed(if stderr.is_empty() {
                format!("'{}' exited with status {}", self.program, status)
            } else {
                format!("'{}' exited with status {}: {}", self.program, status, stderr)
            }))
        }
    }
}
