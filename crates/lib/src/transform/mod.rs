//! Post-install transforms applied to a staged prefix.
//!
//! Every step rewrites the whole staged tree in place and is idempotent. The
//! first failing step aborts the install before anything is merged.
//!
//! | Step                | Archive | Build |
//! |---------------------|---------|-------|
//! | conflict cleanup    | yes     | yes   |
//! | pkg-config paths    |         | yes   |
//! | libtool purge       |         | yes   |
//! | hardlink dedup      |         | yes   |
//! | RPATH relocation    |         | yes   |
//! | NDEBUG normalizing  |         | yes   |
//! | license copy        |         | yes   |
//!
//! Archives were produced from an already transformed tree, so only conflict
//! cleanup runs on them. Components flagged `skip_post_install` only get
//! conflict cleanup as well.

mod conflicts;
mod elf;
mod hardlinks;
mod libtool;
mod license;
mod ndebug;
mod pkgconfig;

pub use conflicts::remove_conflicting_files;
pub use elf::{ElfInfo, fix_rpaths, read_elf_info, rpath_replacement};
pub use hardlinks::{
  EntryKind, FileIdentity, SnapshotEntry, SymlinkPlan, dedup_hardlinks, plan_dedup, snapshot_tree,
};
pub use libtool::purge_libtool_files;
pub use license::copy_license;
pub use ndebug::{NdebugRewriter, normalize_ndebug};
pub use pkgconfig::{relocate_pkgconfig, relocation_expr};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::component::Build;
use crate::config::InstallConfig;
use crate::install::InstallSource;
use crate::platform::arch::Arch;
use crate::runner::{Environment, RunnerError, ScriptRunner};

#[derive(Debug, Error)]
pub enum TransformError {
  #[error("transform io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The declared license file exists in neither the build nor the source directory.
  #[error("license file {license} not found (searched {searched:?})")]
  LicenseNotFound { license: String, searched: Vec<PathBuf> },

  /// The external ELF patcher failed.
  #[error("failed to patch {path}: {source}")]
  Patch {
    path: PathBuf,
    #[source]
    source: RunnerError,
  },

  #[error("invalid rewrite pattern: {0}")]
  Pattern(#[from] regex::Error),
}

impl TransformError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub(crate) fn walk(root: &Path) -> impl FnOnce(walkdir::Error) -> Self + '_ {
    move |e| Self::Io {
      path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
      source: e.into(),
    }
  }
}

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  RemoveConflicts,
  RelocatePkgConfig,
  PurgeLibtool,
  DedupHardlinks,
  FixRpaths,
  NormalizeNdebug,
  CopyLicense,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let description = match self {
      Step::RemoveConflicts => "removing conflicting files",
      Step::RelocatePkgConfig => "dropping absolute paths from pkg-config",
      Step::PurgeLibtool => "purging libtool files",
      Step::DedupHardlinks => "converting hardlinks to symbolic",
      Step::FixRpaths => "fixing RPATHs",
      Step::NormalizeNdebug => "replacing NDEBUG preprocessor statements",
      Step::CopyLicense => "copying license file",
    };
    f.write_str(description)
  }
}

/// Steps to run for a tree staged from `source`.
pub fn steps_for(source: InstallSource, build: &Build) -> Vec<Step> {
  let mut steps = vec![Step::RemoveConflicts];
  if source == InstallSource::BinaryArchives || build.component.skip_post_install {
    return steps;
  }
  steps.extend([
    Step::RelocatePkgConfig,
    Step::PurgeLibtool,
    Step::DedupHardlinks,
    Step::FixRpaths,
    Step::NormalizeNdebug,
  ]);
  if build.component.license.is_some() {
    steps.push(Step::CopyLicense);
  }
  steps
}

/// Runs the transform steps over the staged prefix of one build.
pub struct Pipeline<'a, R> {
  pub config: &'a InstallConfig,
  pub build: &'a Build,
  pub env: &'a Environment,
  pub runner: &'a R,
}

impl<R: ScriptRunner> Pipeline<'_, R> {
  pub async fn run(&self, source: InstallSource) -> Result<(), TransformError> {
    for step in steps_for(source, self.build) {
      self.run_step(step).await?;
    }
    Ok(())
  }

  pub async fn run_step(&self, step: Step) -> Result<(), TransformError> {
    let prefix = self.config.staged_prefix();
    info!(component = %self.build.component.name, "{}", step);

    match step {
      Step::RemoveConflicts => remove_conflicting_files(&prefix),
      Step::RelocatePkgConfig => relocate_pkgconfig(&prefix, &self.config.orchestra_root).map(|_| ()),
      Step::PurgeLibtool => purge_libtool_files(&prefix).map(|_| ()),
      Step::DedupHardlinks => dedup_hardlinks(&prefix).map(|_| ()),
      Step::FixRpaths => {
        let arch = Arch::current().unwrap_or(Arch::X86_64);
        fix_rpaths(self.runner, self.env, self.config, &prefix, arch).await.map(|_| ())
      }
      Step::NormalizeNdebug => normalize_ndebug(&prefix, self.build.disable_debug).map(|_| ()),
      Step::CopyLicense => copy_license(self.config, self.build).map(|_| ()),
    }
  }
}
