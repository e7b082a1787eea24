//! Test helpers shared across orchestra-lib unit tests.
//!
//! [`RecordingRunner`] records every command it sees. Shell scripts and
//! `true`/`false` are really executed so install scripts can populate a
//! staging root; everything else (git, the large-file transport, the ELF
//! patcher) is answered with a canned result.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use walkdir::WalkDir;

use crate::runner::{CommandOutput, Environment, ExternalCommand, ProcessRunner, RunnerError, ScriptRunner};

const EXECUTED_PROGRAMS: &[&str] = &["/bin/sh", "true", "false"];

#[derive(Default)]
pub struct RecordingRunner {
  commands: Mutex<Vec<String>>,
  failing: Option<String>,
  outputs: BTreeMap<String, String>,
}

impl RecordingRunner {
  /// A runner on which every invocation of `program` exits with status 1.
  pub fn failing(program: &str) -> Self {
    Self {
      failing: Some(program.to_string()),
      ..Default::default()
    }
  }

  /// Answer stubbed invocations of `program` with `stdout`.
  pub fn with_output(mut self, program: &str, stdout: &str) -> Self {
    self.outputs.insert(program.to_string(), stdout.to_string());
    self
  }

  /// Every command run so far, rendered as `program arg...`.
  pub fn commands(&self) -> Vec<String> {
    self.commands.lock().unwrap().clone()
  }

  /// Recorded commands whose program is `program`.
  pub fn commands_for(&self, program: &str) -> Vec<String> {
    let prefix = format!("{} ", program);
    self
      .commands()
      .into_iter()
      .filter(|c| c == program || c.starts_with(&prefix))
      .collect()
  }
}

impl ScriptRunner for RecordingRunner {
  async fn run(&self, command: &ExternalCommand, env: &Environment) -> Result<CommandOutput, RunnerError> {
    self.commands.lock().unwrap().push(command.to_string());

    if self.failing.as_deref() == Some(command.program.as_str()) {
      return Ok(CommandOutput {
        code: Some(1),
        ..Default::default()
      });
    }
    if EXECUTED_PROGRAMS.contains(&command.program.as_str()) {
      return ProcessRunner.run(command, env).await;
    }
    Ok(CommandOutput {
      code: Some(0),
      stdout: self.outputs.get(&command.program).cloned().unwrap_or_default(),
      stderr: String::new(),
    })
  }
}

/// Write a minimal little-endian 64-bit ELF file with mode 0755.
///
/// A single program header is emitted; it is `PT_DYNAMIC` when `dynamic` is
/// set and `PT_LOAD` otherwise.
pub fn write_elf(path: &Path, file_type: u16, machine: u16, dynamic: bool) {
  let mut bytes = vec![0u8; 64 + 56];
  bytes[..4].copy_from_slice(b"\x7fELF");
  bytes[4] = 2;
  bytes[5] = 1;
  bytes[6] = 1;
  bytes[16..18].copy_from_slice(&file_type.to_le_bytes());
  bytes[18..20].copy_from_slice(&machine.to_le_bytes());
  bytes[32..40].copy_from_slice(&64u64.to_le_bytes());
  bytes[52..54].copy_from_slice(&64u16.to_le_bytes());
  bytes[54..56].copy_from_slice(&56u16.to_le_bytes());
  bytes[56..58].copy_from_slice(&1u16.to_le_bytes());
  let p_type: u32 = if dynamic { 2 } else { 1 };
  bytes[64..68].copy_from_slice(&p_type.to_le_bytes());

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, bytes).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}

/// Sorted, root-relative paths of every non-directory entry below `root`.
pub fn list_tree(root: &Path) -> Vec<PathBuf> {
  let mut entries: Vec<PathBuf> = WalkDir::new(root)
    .min_depth(1)
    .into_iter()
    .map(|e| e.unwrap())
    .filter(|e| !e.file_type().is_dir())
    .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
    .collect();
  entries.sort();
  entries
}
