use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{MetadataError, load_file_list};
use crate::config::InstallConfig;

fn remove_if_present(path: &Path) -> Result<bool, MetadataError> {
  match fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => Ok(false),
    Ok(_) => fs::remove_file(path).map(|_| true).map_err(MetadataError::io(path)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(MetadataError::Io {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Remove `dir` and its ancestors below `root` for as long as they are empty.
fn prune_empty_dirs(root: &Path, dir: &Path) {
  let mut current = Some(dir);
  while let Some(dir) = current {
    if dir == root || !dir.starts_with(root) {
      break;
    }
    // Fails on non-empty directories, which ends the walk.
    if fs::remove_dir(dir).is_err() {
      break;
    }
    current = dir.parent();
  }
}

/// Remove every file the installed manifest of `component` lists, then the
/// manifest and metadata themselves.
///
/// Returns the files removed; an empty list when `component` was not
/// installed.
pub fn uninstall(config: &InstallConfig, component: &str) -> Result<Vec<PathBuf>, MetadataError> {
  let Some(manifest) = load_file_list(config, component)? else {
    debug!(component, "not installed, nothing to uninstall");
    return Ok(Vec::new());
  };
  info!(component, build = %manifest.build, files = manifest.files.len(), "uninstalling");

  let root = &config.orchestra_root;
  let mut removed = Vec::new();
  let mut parents = BTreeSet::new();
  for file in &manifest.files {
    let path = root.join(file);
    if remove_if_present(&path)? {
      removed.push(path.clone());
    }
    if let Some(parent) = path.parent() {
      parents.insert(parent.to_path_buf());
    }
  }

  for record in [config.file_list_path(component), config.metadata_path(component)] {
    if remove_if_present(&record)? {
      removed.push(record);
    }
  }

  // Deepest first so children are gone before their parents are tried.
  for dir in parents.iter().rev() {
    prune_empty_dirs(root, dir);
  }

  Ok(removed)
}
