//! Lexical path arithmetic.
//!
//! These helpers never touch the filesystem, so they work on paths inside a
//! staging root that do not exist at their final location yet.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without following symlinks.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.components().next_back() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        Some(Component::RootDir | Component::Prefix(_)) => {}
        _ => out.push(".."),
      },
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Path leading from directory `from` to `to`.
///
/// Both paths must be expressed against the same base (both absolute or both
/// relative to the same root). Returns `.` when they are equal.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
  let from = normalize(from);
  let to = normalize(to);
  let from: Vec<_> = from.components().collect();
  let to: Vec<_> = to.components().collect();

  let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

  let mut out = PathBuf::new();
  for _ in common..from.len() {
    out.push("..");
  }
  for component in &to[common..] {
    out.push(component.as_os_str());
  }
  if out.as_os_str().is_empty() {
    out.push(".");
  }
  out
}
