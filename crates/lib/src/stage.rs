//! Install transaction for a single component build.
//!
//! [`InstallAction::run`] drives the full flow:
//!
//! 1. Recreate the staging root with the standard skeleton
//! 2. Index the staged prefix
//! 3. Fetch and extract a binary archive, or run the install script and the
//!    transform pipeline (optionally publishing a new archive)
//! 4. Refresh the branch aliases of the archive
//! 5. Index the staged prefix again; the difference is the component's files
//! 6. Retire the previous installation and merge into the shared root
//! 7. Persist the file list and install metadata
//! 8. Remove the staging root
//!
//! Steps 6 and 7 are skipped with `no_merge`, step 8 with `keep_tmproot`.
//! Nothing is rolled back on failure; the staging root is left in place for
//! inspection.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{ArchiveCache, ArchiveError, config_branch, extract_archive, fetch_archive};
use crate::component::Build;
use crate::config::{ConfigError, InstallConfig};
use crate::install::{
  FileManifest, InstallMetadata, InstallSource, MetadataError, index_directory, installed_build, load_metadata,
  merge_tree, new_entries, save_file_list, save_metadata, uninstall,
};
use crate::runner::{self, Environment, RunnerError, ScriptRunner, run_checked};
use crate::transform::{Pipeline, TransformError};

/// Errors that can abort an install.
#[derive(Debug, Error)]
pub enum InstallError {
  #[error("configuration error: {0}")]
  Configuration(String),

  /// Neither a binary archive nor a build is available.
  #[error("could not find binary archive nor build: {0}")]
  MissingArtifact(String),

  /// The install script exited unsuccessfully.
  #[error("install script of {build} failed: {source}")]
  BuildFailure {
    build: String,
    #[source]
    source: RunnerError,
  },

  /// The staging root could not be set up as expected.
  #[error("staging error at {path}: {reason}")]
  Staging { path: PathBuf, reason: String },

  #[error(transparent)]
  Archive(ArchiveError),

  #[error(transparent)]
  Transform(#[from] TransformError),

  #[error(transparent)]
  Metadata(#[from] MetadataError),
}

impl From<ConfigError> for InstallError {
  fn from(e: ConfigError) -> Self {
    match e {
      ConfigError::Invalid(reason) => Self::Configuration(reason),
      other => Self::Configuration(other.to_string()),
    }
  }
}

impl From<ArchiveError> for InstallError {
  fn from(e: ArchiveError) -> Self {
    match e {
      ArchiveError::UnknownRepository { .. } => Self::Configuration(e.to_string()),
      other => Self::Archive(other),
    }
  }
}

impl InstallError {
  fn staging(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |e| Self::Staging {
      path: path.to_path_buf(),
      reason: e.to_string(),
    }
  }
}

/// Where an install may get its files from.
#[derive(Debug, Clone, Copy)]
pub struct InstallSources {
  pub allow_build: bool,
  pub allow_archive: bool,
  /// Publish a new archive after building.
  pub create_archive: bool,
}

impl Default for InstallSources {
  fn default() -> Self {
    Self {
      allow_build: true,
      allow_archive: true,
      create_archive: false,
    }
  }
}

/// Per-invocation switches of [`InstallAction::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  /// Leave the shared root and metadata untouched.
  pub no_merge: bool,
  /// Keep the staging root after the install.
  pub keep_tmproot: bool,
  /// Run the build's tests, if it has any.
  pub run_tests: bool,
}

/// Result of a completed install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
  pub source: InstallSource,
  /// Files the component added, relative to the shared root.
  pub new_files: Vec<PathBuf>,
  pub install_time: Duration,
  /// Archive published by this install, if any.
  pub published_archive: Option<PathBuf>,
  pub aliases: Vec<PathBuf>,
  pub merged: bool,
}

/// Installs one build into the shared root.
pub struct InstallAction<'a, R> {
  build: &'a Build,
  config: &'a InstallConfig,
  runner: &'a R,
  sources: InstallSources,
}

impl<'a, R: ScriptRunner> InstallAction<'a, R> {
  pub fn new(
    build: &'a Build,
    config: &'a InstallConfig,
    runner: &'a R,
    sources: InstallSources,
  ) -> Result<Self, InstallError> {
    if !sources.allow_build && !sources.allow_archive {
      return Err(InstallError::Configuration(format!(
        "you must allow at least one option between building and installing from binary archives for {}",
        build.qualified_name()
      )));
    }
    config.validate()?;
    ArchiveCache::new(config).select_repository(&build.component)?;
    Ok(Self {
      build,
      config,
      runner,
      sources,
    })
  }

  /// e.g. `install (build or binary archives)`
  pub fn description(&self) -> String {
    let mut sources = Vec::new();
    if self.sources.allow_build {
      sources.push("build");
    }
    if self.sources.allow_archive {
      sources.push("binary archives");
    }
    format!("install ({})", sources.join(" or "))
  }

  /// Whether the shared root already holds exactly this build.
  pub fn is_satisfied(&self) -> Result<bool, InstallError> {
    Ok(is_satisfied(
      self.config,
      &self.build.component.name,
      &self.build.name,
      &self.build.recursive_hash,
    )?)
  }

  pub async fn run(&self, options: &RunOptions, set_manually_installed: bool) -> Result<InstallOutcome, InstallError> {
    let component = &self.build.component.name;
    let prefix = self.config.staged_prefix();
    let env = self.config.environment(self.build);
    info!(component = %component, build = %self.build.name, action = %self.description(), "starting install");

    info!("preparing temporary root directory");
    self.prepare_tmproot()?;
    let pre_index = index_directory(&prefix)?;

    let started = Instant::now();
    let cache = ArchiveCache::new(self.config);
    let archive = if self.sources.allow_archive { cache.locate(self.build) } else { None };
    let (source, published_archive) = match archive {
      Some(archive) => {
        self.install_from_archive(&archive, &env).await?;
        (InstallSource::BinaryArchives, None)
      }
      None if self.sources.allow_build => {
        let published = self.build_and_install(&env, options.run_tests).await?;
        (InstallSource::Build, published)
      }
      None => return Err(InstallError::MissingArtifact(self.build.qualified_name())),
    };
    let install_time = started.elapsed();

    info!("updating binary archive symlinks");
    let branch = config_branch(self.runner, &env, self.config.dotdir.as_deref()).await;
    let aliases = cache.refresh_aliases(self.build, &branch)?;

    let mut post_index = index_directory(&prefix)?;
    for record in [self.config.file_list_path(component), self.config.metadata_path(component)] {
      if let Some(relative) = self.config.relative_to_root(&record) {
        post_index.push(relative);
      }
    }
    let new_files = new_entries(&pre_index, &post_index);
    debug!(count = new_files.len(), "indexed new files");

    if !options.no_merge {
      let previous = load_metadata(self.config, component)?;
      if installed_build(self.config, component)?.is_some() {
        info!("uninstalling previously installed build");
        uninstall(self.config, component)?;
      }

      info!("merging installed files into orchestra root directory");
      merge_tree(&prefix, &self.config.orchestra_root)?;

      save_file_list(self.config, &FileManifest::new(self.build, new_files.clone()))?;
      let mut metadata = previous.unwrap_or_else(|| InstallMetadata::from_build(self.build));
      metadata.update(self.build, source, install_time, set_manually_installed);
      save_metadata(self.config, &metadata)?;
    }

    if !options.keep_tmproot {
      info!("cleaning up tmproot");
      remove_dir_if_present(&self.config.tmp_root)?;
    }

    info!(component = %component, source = %source, elapsed = ?install_time, "install complete");
    Ok(InstallOutcome {
      source,
      new_files,
      install_time,
      published_archive,
      aliases,
      merged: !options.no_merge,
    })
  }

  fn prepare_tmproot(&self) -> Result<(), InstallError> {
    let prefix = self.config.staged_prefix();
    remove_dir_if_present(&self.config.tmp_root)?;

    for dir in [
      "include",
      "lib64/include",
      "lib64/pkgconfig",
      "bin",
      "usr/lib",
      "usr/include",
      "share/info",
      "share/doc",
      "share/man",
      "share/orchestra",
      "libexec",
    ] {
      let path = prefix.join(dir);
      fs::create_dir_all(&path).map_err(InstallError::staging(&path))?;
    }

    link_lib_dir(&prefix)?;

    let info_dir = prefix.join("share/info/dir");
    fs::write(&info_dir, "").map_err(InstallError::staging(&info_dir))?;
    Ok(())
  }

  async fn install_from_archive(&self, archive: &Path, env: &Environment) -> Result<(), InstallError> {
    info!(path = ?archive, "fetching binary archive");
    let archive = fetch_archive(self.runner, env, archive).await?;

    info!("extracting binary archive");
    extract_archive(&archive, &self.config.staged_prefix())?;

    self.pipeline(env).run(InstallSource::BinaryArchives).await?;
    Ok(())
  }

  async fn build_and_install(&self, env: &Environment, run_tests: bool) -> Result<Option<PathBuf>, InstallError> {
    let run_tests = self.build.run_tests && run_tests;
    let env = env.clone().with(runner::RUN_TESTS, if run_tests { "1" } else { "0" });

    info!(script = %self.build.install_script, "executing install script");
    run_checked(self.runner, &self.build.install_script, &env)
      .await
      .map_err(|source| InstallError::BuildFailure {
        build: self.build.qualified_name(),
        source,
      })?;

    self.pipeline(&env).run(InstallSource::Build).await?;

    if !self.sources.create_archive {
      return Ok(None);
    }
    info!("creating binary archive");
    Ok(ArchiveCache::new(self.config).publish(self.build, &self.config.staged_prefix())?)
  }

  fn pipeline<'p>(&'p self, env: &'p Environment) -> Pipeline<'p, R> {
    Pipeline {
      config: self.config,
      build: self.build,
      env,
      runner: self.runner,
    }
  }
}

/// Point `<prefix>/lib` at `lib64`, failing if something else already holds
/// that name.
fn link_lib_dir(prefix: &Path) -> Result<(), InstallError> {
  let lib = prefix.join("lib");
  if fs::symlink_metadata(&lib).is_err() {
    symlink("lib64", &lib).map_err(InstallError::staging(&lib))?;
  }
  if !fs::symlink_metadata(&lib).is_ok_and(|m| m.file_type().is_symlink()) {
    return Err(InstallError::Staging {
      path: lib,
      reason: "expected a symlink to lib64".to_string(),
    });
  }
  Ok(())
}

fn remove_dir_if_present(path: &Path) -> Result<(), InstallError> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(InstallError::staging(path)(e)),
  }
}

/// True iff the installed metadata of `component` records exactly `build` at
/// `recursive_hash`.
pub fn is_satisfied(
  config: &InstallConfig,
  component: &str,
  build: &str,
  recursive_hash: &str,
) -> Result<bool, MetadataError> {
  if installed_build(config, component)?.as_deref() != Some(build) {
    return Ok(false);
  }
  Ok(load_metadata(config, component)?.is_some_and(|m| m.build == build && m.recursive_hash == recursive_hash))
}
