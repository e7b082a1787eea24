//! The environment handed to every external invocation.

use std::collections::BTreeMap;

/// Staging root the build installs into.
pub const TMP_ROOT: &str = "TMP_ROOT";
/// Shared install root.
pub const ORCHESTRA_ROOT: &str = "ORCHESTRA_ROOT";
/// Always equal to `TMP_ROOT`.
pub const DESTDIR: &str = "DESTDIR";
/// Root of the binary archive repositories.
pub const BINARY_ARCHIVES: &str = "BINARY_ARCHIVES";
/// `1` when the build should run its test suite, `0` otherwise.
pub const RUN_TESTS: &str = "RUN_TESTS";
pub const BUILD_DIR: &str = "BUILD_DIR";
pub const SOURCE_DIR: &str = "SOURCE_DIR";
/// Directory holding the orchestration configuration.
pub const ORCHESTRA_DOTDIR: &str = "ORCHESTRA_DOTDIR";
/// Sentinel string builds embed in their RPATHs.
pub const RPATH_PLACEHOLDER: &str = "RPATH_PLACEHOLDER";

/// Immutable name to value mapping passed to external commands.
///
/// Built once per invocation; [`Environment::with`] returns a new value rather
/// than mutating shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
  vars: BTreeMap<String, String>,
}

impl Environment {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.vars.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}
