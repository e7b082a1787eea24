//! Selective large-file fetch of a single archive.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::ArchiveError;
use crate::consts::REPOSITORY_MARKER;
use crate::runner::{Environment, ExternalCommand, ScriptRunner, run_checked};

/// Walk up from `archive` to the checkout containing it.
pub fn find_repository(archive: &Path) -> Result<PathBuf, ArchiveError> {
  let mut dir = archive.parent();
  while let Some(current) = dir {
    // The filesystem root never counts as a repository.
    if current.parent().is_none() {
      break;
    }
    if current.join(REPOSITORY_MARKER).exists() {
      return Ok(current.to_path_buf());
    }
    dir = current.parent();
  }
  Err(ArchiveError::RepositoryNotFound(archive.to_path_buf()))
}

/// Command materializing only `file` from the large-file store of `repository`.
pub fn lfs_fetch_command(repository: &Path, file: &Path) -> ExternalCommand {
  let include = file.strip_prefix(repository).unwrap_or(file);
  ExternalCommand::new("git")
    .arg("-C")
    .path_arg(repository)
    .args(["lfs", "pull", "--include"])
    .path_arg(include)
    .captured()
}

/// Make sure the content of `archive` is present locally.
///
/// Alias symlinks are resolved first so the transport is asked for the
/// content-addressed file, never the alias.
pub async fn fetch_archive<R: ScriptRunner>(runner: &R, env: &Environment, archive: &Path) -> Result<PathBuf, ArchiveError> {
  let repository = find_repository(archive)?;
  let repository = dunce::canonicalize(&repository).map_err(ArchiveError::io(&repository))?;
  let real_path = dunce::canonicalize(archive).map_err(ArchiveError::io(archive))?;

  info!(repository = ?repository, path = ?real_path, "fetching binary archive");
  let output = run_checked(runner, &lfs_fetch_command(&repository, &real_path), env).await?;
  if !output.stdout.is_empty() {
    debug!(stdout = %output.stdout.trim(), "large-file transport output");
  }

  Ok(real_path)
}
