//! Implementation of the `orchestra status` command.
//!
//! Shows the installed build of a component and its install metadata.

use std::path::Path;

use anyhow::Result;

use orchestra_lib::install::{installed_build, load_file_list, load_metadata};

use crate::manifest::Manifest;
use crate::output::{OutputFormat, format_duration, print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_status(config: &Path, component: &str, output: OutputFormat) -> Result<()> {
  let manifest = Manifest::load(config)?;
  let config = &manifest.config;

  let build = installed_build(config, component)?;
  let metadata = load_metadata(config, component)?;
  let files = load_file_list(config, component)?.map(|m| m.files.len()).unwrap_or(0);

  if output.is_json() {
    let json_output = serde_json::json!({
      "component": component,
      "installed": build.is_some(),
      "build": build,
      "files": files,
      "metadata": metadata,
    });
    return print_json(&json_output);
  }

  let Some(build) = build else {
    print_info(&format!("{} is not installed", component));
    return Ok(());
  };

  print_success(&format!("{}@{} is installed", component, build));
  print_stat("Files", &files.to_string());
  if let Some(metadata) = metadata {
    print_stat("Source", &metadata.source.to_string());
    print_stat("Recursive hash", truncate_hash(&metadata.recursive_hash));
    print_stat("Manually installed", &metadata.manually_installed.to_string());
    print_stat("Install time", &format_duration(metadata.install_time));
    if !metadata.binary_archive_path.is_empty() {
      print_stat("Binary archive", &metadata.binary_archive_path);
    }
  }
  Ok(())
}
