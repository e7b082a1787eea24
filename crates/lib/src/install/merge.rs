use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::MetadataError;

/// Remove a non-directory entry at `path` if one exists.
fn remove_existing(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => Err(io::Error::new(
      io::ErrorKind::AlreadyExists,
      "a directory is in the way",
    )),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Merge the staged tree at `source` into `destination`.
///
/// Directories are created, regular files are hardlinked and symlinks are
/// recreated with the same target. Existing non-directory entries in
/// `destination` are replaced. Returns the number of entries linked.
pub fn merge_tree(source: &Path, destination: &Path) -> Result<usize, MetadataError> {
  fs::create_dir_all(destination).map_err(MetadataError::io(destination))?;

  let mut linked = 0;
  for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(MetadataError::walk(source))?;
    let Ok(relative) = entry.path().strip_prefix(source) else {
      continue;
    };
    let target = destination.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(&target).map_err(MetadataError::io(&target))?;
      }
      fs::create_dir_all(&target).map_err(MetadataError::io(&target))?;
      continue;
    }

    remove_existing(&target).map_err(MetadataError::io(&target))?;
    if file_type.is_symlink() {
      let link = fs::read_link(entry.path()).map_err(MetadataError::io(entry.path()))?;
      symlink(&link, &target).map_err(MetadataError::io(&target))?;
    } else {
      fs::hard_link(entry.path(), &target).map_err(MetadataError::io(&target))?;
    }
    linked += 1;
  }

  debug!(source = ?source, destination = ?destination, linked, "merged staged tree");
  Ok(linked)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_file;
  use std::os::unix::fs::MetadataExt;
  use tempfile::TempDir;

  #[test]
  fn hardlinks_files_and_recreates_symlinks() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let root = temp.path().join("root");
    write_file(&staged.join("lib64/libz.so.1"), "elf");
    symlink("libz.so.1", staged.join("lib64/libz.so")).unwrap();
    symlink("lib64", staged.join("lib")).unwrap();
    fs::create_dir_all(staged.join("share/doc")).unwrap();

    assert_eq!(merge_tree(&staged, &root).unwrap(), 3);

    let staged_meta = fs::metadata(staged.join("lib64/libz.so.1")).unwrap();
    let merged_meta = fs::metadata(root.join("lib64/libz.so.1")).unwrap();
    assert_eq!(staged_meta.ino(), merged_meta.ino());
    assert_eq!(fs::read_link(root.join("lib64/libz.so")).unwrap(), Path::new("libz.so.1"));
    assert_eq!(fs::read_link(root.join("lib")).unwrap(), Path::new("lib64"));
    assert!(root.join("share/doc").is_dir());
  }

  #[test]
  fn replaces_existing_entries() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let root = temp.path().join("root");
    write_file(&staged.join("bin/tool"), "new");
    symlink("lib64", staged.join("lib")).unwrap();
    write_file(&root.join("bin/tool"), "old");
    symlink("lib64", root.join("lib")).unwrap();

    merge_tree(&staged, &root).unwrap();

    assert_eq!(fs::read_to_string(root.join("bin/tool")).unwrap(), "new");
    assert_eq!(fs::read_link(root.join("lib")).unwrap(), Path::new("lib64"));
  }

  #[test]
  fn directory_in_the_way_is_an_error() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("staged");
    let root = temp.path().join("root");
    write_file(&staged.join("bin/tool"), "new");
    fs::create_dir_all(root.join("bin/tool")).unwrap();

    assert!(matches!(merge_tree(&staged, &root), Err(MetadataError::Io { .. })));
  }
}
