//! Rewrites `NDEBUG` tests in installed headers into constant conditions.
//!
//! Headers shipped by a build must behave the same no matter whether the
//! consumer defines `NDEBUG`, so every test is pinned to the debug setting of
//! the build that produced them.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use super::TransformError;

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];

/// Pins `NDEBUG` tests to the values of one debug setting.
pub struct NdebugRewriter {
  debug: &'static str,
  ndebug: &'static str,
  ifndef: Regex,
  ifdef: Regex,
  not_defined: Regex,
  defined: Regex,
}

impl NdebugRewriter {
  /// `disable_debug` selects (debug, ndebug) = (0, 1); otherwise (1, 0).
  pub fn new(disable_debug: bool) -> Result<Self, TransformError> {
    let (debug, ndebug) = if disable_debug { ("0", "1") } else { ("1", "0") };
    Ok(Self {
      debug,
      ndebug,
      ifndef: Regex::new(r"^\s*#\s*ifndef\s+NDEBUG\b")?,
      ifdef: Regex::new(r"^\s*#\s*ifdef\s+NDEBUG\b")?,
      not_defined: Regex::new(r"^(?P<head>\s*#\s*if\s+.*)!\s*defined\s*\(\s*NDEBUG\s*\)")?,
      defined: Regex::new(r"^(?P<head>\s*#\s*if\s+.*)defined\s*\(\s*NDEBUG\s*\)")?,
    })
  }

  /// Rewrite a single line (without its terminator).
  ///
  /// Each rule is applied at most once, in order. A rewritten directive no
  /// longer mentions `NDEBUG`, so rewriting twice yields the same line.
  pub fn rewrite_line(&self, line: &str) -> String {
    let line = self.ifndef.replace(line, format!("#if {}", self.debug));
    let line = self.ifdef.replace(&line, format!("#if {}", self.ndebug));
    let line = self.not_defined.replace(&line, format!("${{head}}{}", self.debug));
    let line = self.defined.replace(&line, format!("${{head}}{}", self.ndebug));
    line.into_owned()
  }

  pub fn rewrite(&self, content: &str) -> String {
    content
      .split_inclusive('\n')
      .map(|line| {
        let (body, terminator) = match line.strip_suffix('\n') {
          Some(body) => (body, "\n"),
          None => (line, ""),
        };
        if body.contains("NDEBUG") {
          self.rewrite_line(body) + terminator
        } else {
          line.to_string()
        }
      })
      .collect()
  }
}

fn is_header(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| HEADER_EXTENSIONS.contains(&e))
}

/// Normalize every header below `<prefix>/include`. Returns the number of
/// files rewritten.
pub fn normalize_ndebug(prefix: &Path, disable_debug: bool) -> Result<usize, TransformError> {
  let include = prefix.join("include");
  if !include.is_dir() {
    return Ok(0);
  }

  let rewriter = NdebugRewriter::new(disable_debug)?;
  let mut rewritten = 0;
  for entry in WalkDir::new(&include).sort_by_file_name() {
    let entry = entry.map_err(TransformError::walk(&include))?;
    let path = entry.path();
    if !entry.file_type().is_file() || !is_header(path) {
      continue;
    }

    let bytes = fs::read(path).map_err(TransformError::io(path))?;
    let Ok(content) = String::from_utf8(bytes) else {
      debug!(path = ?path, "skipping non-UTF-8 header");
      continue;
    };
    let updated = rewriter.rewrite(&content);
    if updated != content {
      debug!(path = ?path, "rewrote NDEBUG conditions");
      fs::write(path, updated).map_err(TransformError::io(path))?;
      rewritten += 1;
    }
  }

  Ok(rewritten)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_file;
  use tempfile::TempDir;

  #[test]
  fn rewrites_each_directive_form() {
    let rewriter = NdebugRewriter::new(false).unwrap();
    assert_eq!(rewriter.rewrite_line("#ifndef NDEBUG"), "#if 1");
    assert_eq!(rewriter.rewrite_line("  #  ifdef NDEBUG"), "#if 0");
    assert_eq!(rewriter.rewrite_line("#if !defined(NDEBUG) && FOO"), "#if 1 && FOO");
    assert_eq!(rewriter.rewrite_line("#if defined(NDEBUG) || BAR"), "#if 0 || BAR");
  }

  #[test]
  fn disabled_debug_swaps_values() {
    let rewriter = NdebugRewriter::new(true).unwrap();
    assert_eq!(rewriter.rewrite_line("#ifndef NDEBUG"), "#if 0");
    assert_eq!(rewriter.rewrite_line("#ifdef NDEBUG"), "#if 1");
    assert_eq!(rewriter.rewrite_line("#if !defined(NDEBUG)"), "#if 0");
    assert_eq!(rewriter.rewrite_line("#if defined(NDEBUG)"), "#if 1");
  }

  #[test]
  fn leaves_unrelated_lines_alone() {
    let rewriter = NdebugRewriter::new(false).unwrap();
    assert_eq!(rewriter.rewrite_line("#ifndef NDEBUG_EXTRA"), "#ifndef NDEBUG_EXTRA");
    assert_eq!(rewriter.rewrite_line("// NDEBUG is honoured"), "// NDEBUG is honoured");
    assert_eq!(rewriter.rewrite_line("#elif defined(NDEBUG)"), "#elif defined(NDEBUG)");
  }

  #[test]
  fn rewrites_headers_under_include_only() {
    let temp = TempDir::new().unwrap();
    let prefix = temp.path();
    write_file(
      &prefix.join("include/llvm/Config.h"),
      "#ifndef NDEBUG\nint checks;\n#endif\n#if defined(NDEBUG)\n#endif",
    );
    write_file(&prefix.join("include/llvm/plain.hpp"), "int x;\n");
    write_file(&prefix.join("share/doc/example.h"), "#ifdef NDEBUG\n");

    assert_eq!(normalize_ndebug(prefix, true).unwrap(), 1);
    assert_eq!(
      fs::read_to_string(prefix.join("include/llvm/Config.h")).unwrap(),
      "#if 0\nint checks;\n#endif\n#if 1\n#endif"
    );
    assert_eq!(
      fs::read_to_string(prefix.join("share/doc/example.h")).unwrap(),
      "#ifdef NDEBUG\n"
    );

    assert_eq!(normalize_ndebug(prefix, true).unwrap(), 0);
  }

  #[test]
  fn missing_include_dir_is_noop() {
    let temp = TempDir::new().unwrap();
    assert_eq!(normalize_ndebug(temp.path(), false).unwrap(), 0);
  }
}
