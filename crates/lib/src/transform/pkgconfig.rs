//! Makes pkg-config files relocatable.
//!
//! Absolute occurrences of the install root become `${pcfiledir}` followed by
//! the `..` chain leading from the file's directory back to the root, which
//! pkg-config resolves at consumption time.

use std::fs;
use std::path::Path;

use regex::{Captures, Regex};
use tracing::debug;
use walkdir::WalkDir;

use super::TransformError;

/// Expression resolving to the install root from a `.pc` file `depth`
/// directories below it.
pub fn relocation_expr(depth: usize) -> String {
  let mut expr = String::from("${pcfiledir}");
  for _ in 0..depth {
    expr.push_str("/..");
  }
  expr
}

fn root_pattern(root: &Path) -> Result<Regex, regex::Error> {
  let root = root.to_string_lossy();
  let trimmed = root.trim_matches('/');
  Regex::new(&format!(
    r"/+{}(?P<tail>/|$|[^A-Za-z0-9_.\-])",
    regex::escape(trimmed)
  ))
}

/// Rewrite every `.pc` file below `prefix`. Returns the number of files changed.
pub fn relocate_pkgconfig(prefix: &Path, root: &Path) -> Result<usize, TransformError> {
  let pattern = root_pattern(root)?;
  let mut changed = 0;

  for entry in WalkDir::new(prefix) {
    let entry = entry.map_err(TransformError::walk(prefix))?;
    if !entry.file_type().is_file() || entry.path().extension().is_none_or(|e| e != "pc") {
      continue;
    }

    let path = entry.path();
    let depth = path
      .parent()
      .and_then(|dir| dir.strip_prefix(prefix).ok())
      .map(|dir| dir.components().count())
      .unwrap_or(0);
    let expr = relocation_expr(depth);

    let content = fs::read_to_string(path).map_err(TransformError::io(path))?;
    let rewritten = pattern.replace_all(&content, |caps: &Captures| format!("{}{}", expr, &caps["tail"]));
    if rewritten != content {
      debug!(path = ?path, "relocated pkg-config file");
      fs::write(path, rewritten.as_bytes()).map_err(TransformError::io(path))?;
      changed += 1;
    }
  }

  Ok(changed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::path::normalize;
  use std::path::PathBuf;
  use tempfile::TempDir;

  const PC: &str = "prefix=/opt/orchestra/root\n\
libdir=/opt/orchestra/root/lib64\n\
other=/opt/orchestra/rootfs/lib\n\
Cflags: -I/opt/orchestra/root/include\n";

  #[test]
  fn expr_climbs_one_level_per_directory() {
    assert_eq!(relocation_expr(0), "${pcfiledir}");
    assert_eq!(relocation_expr(2), "${pcfiledir}/../..");
  }

  #[test]
  fn rewrites_root_occurrences_only() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("lib64/pkgconfig");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("zlib.pc"), PC).unwrap();

    let changed = relocate_pkgconfig(temp.path(), Path::new("/opt/orchestra/root")).unwrap();

    assert_eq!(changed, 1);
    assert_eq!(
      fs::read_to_string(dir.join("zlib.pc")).unwrap(),
      "prefix=${pcfiledir}/../..\n\
libdir=${pcfiledir}/../../lib64\n\
other=/opt/orchestra/rootfs/lib\n\
Cflags: -I${pcfiledir}/../../include\n"
    );
  }

  #[test]
  fn rewritten_expression_resolves_to_original_root() {
    let temp = TempDir::new().unwrap();
    let root = Path::new("/opt/orchestra/root");
    let dir = temp.path().join("share/pkgconfig");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.pc"), "prefix=/opt/orchestra/root\n").unwrap();

    relocate_pkgconfig(temp.path(), root).unwrap();

    let content = fs::read_to_string(dir.join("a.pc")).unwrap();
    let value = content.trim().strip_prefix("prefix=").unwrap();
    let final_dir = root.join("share/pkgconfig");
    let resolved = value.replace("${pcfiledir}", &final_dir.to_string_lossy());
    assert_eq!(normalize(&PathBuf::from(resolved)), root);
  }

  #[test]
  fn second_run_changes_nothing() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("lib/pkgconfig")).unwrap();
    fs::write(temp.path().join("lib/pkgconfig/z.pc"), PC).unwrap();
    let root = Path::new("/opt/orchestra/root");

    assert_eq!(relocate_pkgconfig(temp.path(), root).unwrap(), 1);
    assert_eq!(relocate_pkgconfig(temp.path(), root).unwrap(), 0);
  }
}
