//! Hardlink deduplication.
//!
//! The merge step shares content with the install root through hardlinks, so
//! a staged tree must not contain independent hardlinked copies of the same
//! file: every identity group is collapsed onto one regular file and relative
//! symlinks to it.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::TransformError;
use crate::util::path::relative_path;

/// Filesystem identity of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileIdentity {
  pub device: u64,
  pub inode: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  Regular,
  Symlink,
  Other,
}

/// One non-directory entry of a tree snapshot. Paths are relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
  pub path: PathBuf,
  pub identity: FileIdentity,
  pub link_count: u64,
  pub kind: EntryKind,
}

/// Replace `link` with a symlink whose content is `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkPlan {
  pub link: PathBuf,
  pub target: PathBuf,
}

/// Plan the symlinks that collapse every hardlink group in `entries`.
///
/// Only regular files with a link count of two or more and a non-zero inode
/// are grouped. Within a group the lexicographically first path stays a
/// regular file.
pub fn plan_dedup(entries: &[SnapshotEntry]) -> Vec<SymlinkPlan> {
  let mut groups: BTreeMap<FileIdentity, Vec<&Path>> = BTreeMap::new();
  for entry in entries {
    if entry.kind != EntryKind::Regular || entry.link_count < 2 || entry.identity.inode == 0 {
      continue;
    }
    groups.entry(entry.identity).or_default().push(&entry.path);
  }

  let mut plans = Vec::new();
  for mut paths in groups.into_values() {
    if paths.len() < 2 {
      continue;
    }
    paths.sort();
    let canonical = paths[0];
    for other in &paths[1..] {
      let from = other.parent().unwrap_or(Path::new(""));
      plans.push(SymlinkPlan {
        link: other.to_path_buf(),
        target: relative_path(from, canonical),
      });
    }
  }
  plans
}

/// Snapshot the non-directory entries below `root`.
pub fn snapshot_tree(root: &Path) -> Result<Vec<SnapshotEntry>, TransformError> {
  let mut entries = Vec::new();
  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(TransformError::walk(root))?;
    let file_type = entry.file_type();
    if file_type.is_dir() {
      continue;
    }
    let meta = entry.metadata().map_err(TransformError::walk(root))?;
    let kind = if file_type.is_file() {
      EntryKind::Regular
    } else if file_type.is_symlink() {
      EntryKind::Symlink
    } else {
      EntryKind::Other
    };
    entries.push(SnapshotEntry {
      path: entry.path().strip_prefix(root).unwrap_or(entry.path()).to_path_buf(),
      identity: FileIdentity {
        device: meta.dev(),
        inode: meta.ino(),
      },
      link_count: meta.nlink(),
      kind,
    });
  }
  Ok(entries)
}

/// Collapse hardlink groups below `root`. Returns the number of symlinks created.
pub fn dedup_hardlinks(root: &Path) -> Result<usize, TransformError> {
  let plans = plan_dedup(&snapshot_tree(root)?);
  for plan in &plans {
    let link = root.join(&plan.link);
    debug!(link = ?link, target = ?plan.target, "replacing hardlink with symlink");
    fs::remove_file(&link).map_err(TransformError::io(&link))?;
    std::os::unix::fs::symlink(&plan.target, &link).map_err(TransformError::io(&link))?;
  }
  Ok(plans.len())
}
