use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::TransformError;

/// Delete every libtool archive (`*.la`). Returns how many were removed.
pub fn purge_libtool_files(prefix: &Path) -> Result<usize, TransformError> {
  let mut removed = 0;
  for entry in WalkDir::new(prefix) {
    let entry = entry.map_err(TransformError::walk(prefix))?;
    if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "la") {
      fs::remove_file(entry.path()).map_err(TransformError::io(entry.path()))?;
      removed += 1;
    }
  }
  Ok(removed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn removes_only_la_files() {
    let temp = TempDir::new().unwrap();
    let lib = temp.path().join("lib64");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("libz.la"), "").unwrap();
    fs::write(lib.join("libz.so"), "").unwrap();
    fs::write(lib.join("notes.lat"), "").unwrap();

    assert_eq!(purge_libtool_files(temp.path()).unwrap(), 1);
    assert!(!lib.join("libz.la").exists());
    assert!(lib.join("libz.so").exists());
    assert!(lib.join("notes.lat").exists());
  }
}
