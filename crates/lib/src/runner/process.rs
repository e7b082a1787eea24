//! Runs external commands as child processes.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::{CommandOutput, Environment, ExternalCommand, RunnerError, ScriptRunner};

/// [`ScriptRunner`] backed by real child processes.
///
/// The child inherits the parent's environment (build scripts need `PATH`),
/// then receives the invocation [`Environment`], then the command's own
/// overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ScriptRunner for ProcessRunner {
  async fn run(&self, command: &ExternalCommand, env: &Environment) -> Result<CommandOutput, RunnerError> {
    info!(cmd = %command, "executing command");

    let mut process = Command::new(&command.program);
    process.args(&command.args);

    if let Some(cwd) = &command.cwd {
      process.current_dir(cwd);
    }

    for (key, value) in env.iter() {
      process.env(key, value);
    }
    for (key, value) in &command.env {
      process.env(key, value);
    }

    debug!(program = %command.program, cwd = ?command.cwd, "spawning process");

    let spawn_err = |source| RunnerError::Spawn {
      program: command.program.clone(),
      source,
    };

    if !command.capture_output {
      let status = process
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(spawn_err)?;
      return Ok(CommandOutput {
        code: status.code(),
        ..Default::default()
      });
    }

    let output = process.stdin(Stdio::null()).output().await.map_err(spawn_err)?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() && !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }

    Ok(CommandOutput {
      code: output.status.code(),
      stdout,
      stderr,
    })
  }
}
