//! Components and their builds, as seen by the install engine.
//!
//! Hash computation and dependency resolution happen upstream; a [`Build`]
//! arrives here with its hashes and archive location already decided.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::consts::{ARCHIVE_EXTENSION, NO_SOURCE_CONTROL};
use crate::runner::ExternalCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
  pub name: String,
  /// License file path, relative to the build or source directory.
  pub license: Option<String>,
  /// Archive repository this component is pinned to.
  pub binary_archives: Option<String>,
  pub skip_post_install: bool,
  /// Branch to commit mapping of the component's source checkout, if it has one.
  pub heads: Option<BTreeMap<String, String>>,
}

impl Component {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      license: None,
      binary_archives: None,
      skip_post_install: false,
      heads: None,
    }
  }

  pub fn with_license(mut self, license: impl Into<String>) -> Self {
    self.license = Some(license.into());
    self
  }

  pub fn with_heads<I, B, C>(mut self, heads: I) -> Self
  where
    I: IntoIterator<Item = (B, C)>,
    B: Into<String>,
    C: Into<String>,
  {
    self.heads = Some(heads.into_iter().map(|(b, c)| (b.into(), c.into())).collect());
    self
  }

  /// The (branch, commit) pairs alias symlinks are maintained for.
  ///
  /// Components without source control get a single `("none", "none")` pair.
  pub fn alias_pairs(&self) -> Vec<(String, String)> {
    match &self.heads {
      Some(heads) => heads.iter().map(|(b, c)| (b.clone(), c.clone())).collect(),
      None => vec![(NO_SOURCE_CONTROL.to_string(), NO_SOURCE_CONTROL.to_string())],
    }
  }
}

/// One buildable configuration of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
  pub component: Component,
  pub name: String,
  pub run_tests: bool,
  /// Compile headers as if `NDEBUG` were defined.
  pub disable_debug: bool,
  /// Archive directory, relative to a repository's platform directory.
  pub archive_dir: String,
  pub archive_filename: String,
  pub self_hash: String,
  /// Hash over the component and its transitive dependencies. The cache key.
  pub recursive_hash: String,
  pub install_script: ExternalCommand,
  pub build_dir: PathBuf,
  pub source_dir: PathBuf,
}

impl Build {
  pub fn new(component: Component, name: impl Into<String>, recursive_hash: impl Into<String>) -> Self {
    let name = name.into();
    let recursive_hash = recursive_hash.into();
    Self {
      archive_dir: format!("{}/{}", component.name, name),
      archive_filename: archive_filename(NO_SOURCE_CONTROL, &recursive_hash),
      self_hash: recursive_hash.clone(),
      install_script: ExternalCommand::new("true"),
      build_dir: PathBuf::new(),
      source_dir: PathBuf::new(),
      run_tests: false,
      disable_debug: false,
      component,
      name,
      recursive_hash,
    }
  }

  /// Set the commit the archive filename is derived from.
  pub fn with_commit(mut self, commit: &str) -> Self {
    self.archive_filename = archive_filename(commit, &self.recursive_hash);
    self
  }

  pub fn with_install_script(mut self, script: ExternalCommand) -> Self {
    self.install_script = script;
    self
  }

  pub fn with_dirs(mut self, build_dir: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
    self.build_dir = build_dir.into();
    self.source_dir = source_dir.into();
    self
  }

  /// `component@build`
  pub fn qualified_name(&self) -> String {
    format!("{}@{}", self.component.name, self.name)
  }

  /// Archive location relative to a repository's platform directory.
  pub fn binary_archive_path(&self) -> String {
    format!("{}/{}", self.archive_dir, self.archive_filename)
  }
}

/// Canonical archive filename: `<commit>_<recursive_hash>.tar.gz`.
pub fn archive_filename(commit: &str, recursive_hash: &str) -> String {
  format!("{}_{}.{}", commit, recursive_hash, ARCHIVE_EXTENSION)
}

/// Alias symlink filename: `<branch>_<config_branch>.tar.gz`, slashes turned into dashes.
pub fn alias_filename(branch: &str, config_branch: &str) -> String {
  format!(
    "{}_{}.{}",
    branch.replace('/', "-"),
    config_branch.replace('/', "-"),
    ARCHIVE_EXTENSION
  )
}
