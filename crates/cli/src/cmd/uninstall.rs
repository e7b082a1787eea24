//! Implementation of the `orchestra uninstall` command.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use orchestra_lib::install::uninstall;

use crate::manifest::Manifest;
use crate::output::{print_info, print_success};

pub fn cmd_uninstall(config: &Path, component: &str) -> Result<()> {
  let manifest = Manifest::load(config)?;

  let removed = uninstall(&manifest.config, component)?;
  info!(component = %component, removed = removed.len(), "uninstalled component");
  if removed.is_empty() {
    print_info(&format!("{} is not installed", component));
  } else {
    print_success(&format!("Uninstalled {} ({} files removed)", component, removed.len()));
  }
  Ok(())
}
