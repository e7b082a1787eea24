//! Binary archive cache.
//!
//! Archives live in one or more repositories under the `binary_archives`
//! directory:
//!
//! ```text
//! <binary_archives>/<repo>/<platform_tag>/<archive_dir>/
//! ├── <commit>_<recursive_hash>.tar.gz     # immutable, content-addressed
//! └── <branch>_<config_branch>.tar.gz      # alias symlink to the above
//! ```
//!
//! Archive filenames are content-derived, so readers never need to
//! coordinate. Alias symlinks are replaced by unlink-then-link, which leaves a
//! short window where a concurrent reader sees no alias.

mod branch;
mod fetch;
mod pack;

pub use branch::config_branch;
pub use fetch::{fetch_archive, find_repository, lfs_fetch_command};
pub use pack::{create_archive, extract_archive};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::component::{Build, Component, alias_filename, archive_filename};
use crate::config::InstallConfig;
use crate::runner::RunnerError;

/// Errors raised by archive cache operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
  /// A component is pinned to a repository the configuration does not know.
  #[error("component {component} wants an unknown binary archive repository ({repository})")]
  UnknownRepository { component: String, repository: String },

  /// The archive path is not inside any repository checkout.
  #[error("binary archive {0} is not inside a repository")]
  RepositoryNotFound(PathBuf),

  #[error("archive io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("large-file fetch failed: {0}")]
  Transport(#[from] RunnerError),
}

impl ArchiveError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Path computations and lookups over the configured archive repositories.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveCache<'a> {
  config: &'a InstallConfig,
}

impl<'a> ArchiveCache<'a> {
  pub fn new(config: &'a InstallConfig) -> Self {
    Self { config }
  }

  /// Find the archive of `build` in the first repository that has it.
  pub fn locate(&self, build: &Build) -> Option<PathBuf> {
    self.config.archive_repositories.iter().find_map(|repository| {
      let candidate = self.archive_path(repository, build);
      debug!(path = ?candidate, "looking for binary archive");
      candidate.exists().then_some(candidate)
    })
  }

  /// Repository new archives of `component` are published to.
  ///
  /// Returns `Ok(None)` when no repository is configured at all.
  pub fn select_repository(&self, component: &Component) -> Result<Option<&'a str>, ArchiveError> {
    let repositories = &self.config.archive_repositories;
    if let Some(pinned) = &component.binary_archives {
      return match repositories.iter().find(|r| *r == pinned) {
        Some(repository) => Ok(Some(repository.as_str())),
        None => Err(ArchiveError::UnknownRepository {
          component: component.name.clone(),
          repository: pinned.clone(),
        }),
      };
    }
    Ok(repositories.first().map(String::as_str))
  }

  /// Directory holding every archive of `build` in `repository`.
  pub fn archive_dir(&self, repository: &str, build: &Build) -> PathBuf {
    self.config.repository_platform_dir(repository).join(&build.archive_dir)
  }

  pub fn archive_path(&self, repository: &str, build: &Build) -> PathBuf {
    self.archive_dir(repository, build).join(&build.archive_filename)
  }

  /// Publish the staged prefix as the archive of `build`.
  ///
  /// Returns the final archive path, or `None` when no repository is
  /// configured.
  pub fn publish(&self, build: &Build, staged_prefix: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let Some(repository) = self.select_repository(&build.component)? else {
      warn!(component = %build.component.name, "no binary archive repository configured, not creating archive");
      return Ok(None);
    };

    let destination = self.archive_path(repository, build);
    info!(path = ?destination, "creating binary archive");
    create_archive(staged_prefix, &self.config.binary_archives.join(repository), &destination)?;
    Ok(Some(destination))
  }

  /// Point every branch alias of `build` at its canonical archive.
  ///
  /// An alias is only (re)created when the archive it would point to exists.
  /// Returns the aliases written.
  pub fn refresh_aliases(&self, build: &Build, config_branch: &str) -> Result<Vec<PathBuf>, ArchiveError> {
    let Some(repository) = self.select_repository(&build.component)? else {
      warn!("no binary archive repository configured, not updating symlinks");
      return Ok(Vec::new());
    };

    let dir = self.archive_dir(repository, build);
    let mut written = Vec::new();

    for (branch, commit) in build.component.alias_pairs() {
      let target_name = archive_filename(&commit, &build.recursive_hash);
      if !dir.join(&target_name).exists() {
        debug!(branch = %branch, target = %target_name, "archive missing, skipping alias");
        continue;
      }

      let link = dir.join(alias_filename(&branch, config_branch));
      if fs::symlink_metadata(&link).is_ok() {
        fs::remove_file(&link).map_err(ArchiveError::io(&link))?;
      }
      std::os::unix::fs::symlink(&target_name, &link).map_err(ArchiveError::io(&link))?;
      debug!(link = ?link, target = %target_name, "updated archive alias");
      written.push(link);
    }

    Ok(written)
  }
}
