//! External command execution.
//!
//! Every process the install engine spawns (build scripts, git queries, the
//! large-file transport, the ELF patcher) is described by a typed
//! [`ExternalCommand`] and executed through a [`ScriptRunner`]. Commands never
//! go through shell string interpolation unless they explicitly ask for a
//! shell via [`ExternalCommand::shell`].

mod env;
mod process;

pub use env::*;
pub use process::ProcessRunner;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The process could not be started.
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The process exited unsuccessfully where success was required.
  #[error("command failed with exit code {code:?}: {command}")]
  Failed { command: String, code: Option<i32> },
}

/// A single external program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
  /// Program to execute, looked up on `PATH` when not absolute.
  pub program: String,
  #[serde(default)]
  pub args: Vec<String>,
  /// Working directory, defaults to the caller's.
  #[serde(default)]
  pub cwd: Option<PathBuf>,
  /// Variables layered on top of the invocation [`Environment`].
  #[serde(default)]
  pub env: BTreeMap<String, String>,
  /// Capture stdout/stderr instead of inheriting the terminal.
  #[serde(default)]
  pub capture_output: bool,
}

impl ExternalCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
      capture_output: false,
    }
  }

  /// A `/bin/sh -c` invocation of a script.
  pub fn shell(script: impl Into<String>) -> Self {
    Self::new("/bin/sh").arg("-c").arg(script)
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy())
  }

  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn captured(mut self) -> Self {
    self.capture_output = true;
    self
  }
}

impl fmt::Display for ExternalCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// Exit status and, when requested, captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code, `None` when the process was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Executes external commands.
///
/// Implementations block the calling flow until the process exits. A non-zero
/// exit status is reported through [`CommandOutput::code`], not as an error;
/// use [`run_checked`] when failure should abort.
pub trait ScriptRunner: Send + Sync {
  fn run(
    &self,
    command: &ExternalCommand,
    env: &Environment,
  ) -> impl Future<Output = Result<CommandOutput, RunnerError>> + Send;
}

/// Run a command and turn a non-zero exit into [`RunnerError::Failed`].
pub async fn run_checked<R: ScriptRunner>(
  runner: &R,
  command: &ExternalCommand,
  env: &Environment,
) -> Result<CommandOutput, RunnerError> {
  let output = runner.run(command, env).await?;
  if !output.success() {
    return Err(RunnerError::Failed {
      command: command.to_string(),
      code: output.code,
    });
  }
  Ok(output)
}
