use std::fs;
use std::path::Path;

use tracing::debug;

use super::TransformError;

/// Directories that every component tends to regenerate and that would
/// collide across merges.
const CONFLICTING_DIRS: &[&str] = &["share/info", "share/locale"];

pub fn remove_conflicting_files(prefix: &Path) -> Result<(), TransformError> {
  for dir in CONFLICTING_DIRS {
    let path = prefix.join(dir);
    let Ok(meta) = fs::symlink_metadata(&path) else {
      continue;
    };
    debug!(path = ?path, "removing");
    if meta.is_dir() {
      fs::remove_dir_all(&path).map_err(TransformError::io(&path))?;
    } else {
      fs::remove_file(&path).map_err(TransformError::io(&path))?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn removes_info_and_locale_only() {
    let temp = TempDir::new().unwrap();
    let prefix = temp.path();
    fs::create_dir_all(prefix.join("share/info")).unwrap();
    fs::write(prefix.join("share/info/dir"), "").unwrap();
    fs::create_dir_all(prefix.join("share/locale/it/LC_MESSAGES")).unwrap();
    fs::create_dir_all(prefix.join("share/doc")).unwrap();

    remove_conflicting_files(prefix).unwrap();
    remove_conflicting_files(prefix).unwrap();

    assert!(!prefix.join("share/info").exists());
    assert!(!prefix.join("share/locale").exists());
    assert!(prefix.join("share/doc").exists());
  }
}
