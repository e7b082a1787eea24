use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::MetadataError;

/// Every non-directory entry below `root`, relative to it.
///
/// Symlinks are listed, never followed, so a symlink to a directory is an
/// entry of its own. Entries are in walk order with siblings sorted by name.
/// A missing `root` has no entries.
pub fn index_directory(root: &Path) -> Result<Vec<PathBuf>, MetadataError> {
  if !root.exists() {
    return Ok(Vec::new());
  }

  let mut entries = Vec::new();
  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(MetadataError::walk(root))?;
    if entry.file_type().is_dir() {
      continue;
    }
    if let Ok(relative) = entry.path().strip_prefix(root) {
      entries.push(relative.to_path_buf());
    }
  }
  Ok(entries)
}

/// Entries of `after` that are not in `before`, keeping the order of `after`.
pub fn new_entries(before: &[PathBuf], after: &[PathBuf]) -> Vec<PathBuf> {
  let before: BTreeSet<&PathBuf> = before.iter().collect();
  after.iter().filter(|p| !before.contains(p)).cloned().collect()
}
