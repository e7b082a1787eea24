//! CLI smoke tests for orchestra.
//!
//! These run the real binary against a throwaway root and check exit codes
//! and the files left behind.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn orchestra_cmd() -> Command {
  cargo_bin_cmd!("orchestra")
}

/// Write an orchestra.toml with one `hello` component into `temp`.
fn write_config(temp: &Path) -> std::path::PathBuf {
  let path = temp.join("orchestra.toml");
  let content = format!(
    r#"
[config]
orchestra_root = "{root}"
tmp_root = "{tmp}"
binary_archives = "{archives}"

[components.hello]
default_build = "default"

[components.hello.builds.default]
recursive_hash = "h1"
install = '''
set -e
P="$DESTDIR$ORCHESTRA_ROOT"
mkdir -p "$P/bin"
printf 'hello\n' > "$P/bin/hello"
'''

[components.broken.builds.default]
recursive_hash = "h2"
install = "exit 7"
"#,
    root = temp.join("root").display(),
    tmp = temp.join("tmp").display(),
    archives = temp.join("archives").display(),
  );
  fs::write(&path, content).unwrap();
  path
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  orchestra_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  orchestra_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("orchestra"));
}

#[test]
fn install_help_lists_flags() {
  orchestra_cmd()
    .args(["install", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--no-merge"))
    .stdout(predicate::str::contains("--create-binary-archive"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn missing_config_fails() {
  let temp = TempDir::new().unwrap();
  orchestra_cmd()
    .args(["--config"])
    .arg(temp.path().join("nope.toml"))
    .args(["status", "hello"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read configuration"));
}

#[test]
fn unknown_component_fails() {
  let temp = TempDir::new().unwrap();
  let config = write_config(temp.path());
  orchestra_cmd()
    .arg("--config")
    .arg(&config)
    .args(["install", "bzip2"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown component"));
}

#[test]
fn failing_install_script_fails() {
  let temp = TempDir::new().unwrap();
  let config = write_config(temp.path());
  orchestra_cmd()
    .arg("--config")
    .arg(&config)
    .args(["install", "broken"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to install broken@default"));
  assert!(!temp.path().join("root/share/orchestra/broken.idx").exists());
}

#[test]
fn no_sources_is_rejected_by_parser() {
  orchestra_cmd()
    .args(["install", "hello", "--no-build", "--no-binary-archives"])
    .assert()
    .failure();
}

// =============================================================================
// Install / Status / Uninstall
// =============================================================================

#[test]
fn install_status_uninstall_round() {
  let temp = TempDir::new().unwrap();
  let config = write_config(temp.path());
  let root = temp.path().join("root");

  orchestra_cmd()
    .env("ORCHESTRA_CONFIG", &config)
    .args(["install", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello@default"));
  assert_eq!(fs::read_to_string(root.join("bin/hello")).unwrap(), "hello\n");
  assert!(!temp.path().join("tmp").exists());

  orchestra_cmd()
    .env("ORCHESTRA_CONFIG", &config)
    .args(["install", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already installed"));

  orchestra_cmd()
    .env("ORCHESTRA_CONFIG", &config)
    .args(["status", "hello", "--output", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"installed\": true"))
    .stdout(predicate::str::contains("\"manually_installed\": true"))
    .stdout(predicate::str::contains("\"recursive_hash\": \"h1\""));

  orchestra_cmd()
    .env("ORCHESTRA_CONFIG", &config)
    .args(["uninstall", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Uninstalled hello"));
  assert!(!root.join("bin/hello").exists());

  orchestra_cmd()
    .env("ORCHESTRA_CONFIG", &config)
    .args(["status", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello is not installed"));
}

#[test]
fn no_merge_keeps_root_empty() {
  let temp = TempDir::new().unwrap();
  let config = write_config(temp.path());

  orchestra_cmd()
    .arg("--config")
    .arg(&config)
    .args(["install", "hello@default", "--no-merge", "--keep-tmproot"])
    .assert()
    .success();

  assert!(!temp.path().join("root/bin/hello").exists());
  let staged = temp.path().join("tmp").join(temp.path().join("root").strip_prefix("/").unwrap());
  assert!(staged.join("bin/hello").exists());
}
