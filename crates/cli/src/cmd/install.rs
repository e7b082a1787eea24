//! Implementation of the `orchestra install` command.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use orchestra_lib::runner::ProcessRunner;
use orchestra_lib::stage::{InstallAction, InstallSources, RunOptions};

use crate::manifest::{Manifest, parse_component_name};
use crate::output::{format_duration, print_info, print_stat, print_success};

/// Arguments of `orchestra install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
  pub component: String,
  pub build: Option<String>,
  pub force: bool,
  pub no_merge: bool,
  pub create_binary_archive: bool,
  pub keep_tmproot: bool,
  pub test: bool,
  pub no_build: bool,
  pub no_binary_archives: bool,
}

/// Install one build of a component.
///
/// Unless `--force` is given, nothing happens when the requested build is
/// already installed with the same hash. Components installed through this
/// command are marked as manually installed.
pub fn cmd_install(config: &Path, args: &InstallArgs) -> Result<()> {
  let manifest = Manifest::load(config)?;
  let (component, inline_build) = parse_component_name(&args.component);
  let build = manifest.build(component, args.build.as_deref().or(inline_build))?;

  let sources = InstallSources {
    allow_build: !args.no_build,
    allow_archive: !args.no_binary_archives,
    create_archive: args.create_binary_archive,
  };
  let runner = ProcessRunner;
  let action = InstallAction::new(&build, &manifest.config, &runner, sources)?;

  debug!(config = %config.display(), build = %build.qualified_name(), action = %action.description(), "resolved build");

  if !args.force && action.is_satisfied()? {
    print_info(&format!("{} is already installed", build.qualified_name()));
    return Ok(());
  }

  let options = RunOptions {
    no_merge: args.no_merge,
    keep_tmproot: args.keep_tmproot,
    run_tests: args.test,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(action.run(&options, true))
    .with_context(|| format!("Failed to install {}", build.qualified_name()))?;

  if let Some(archive) = &outcome.published_archive {
    info!(path = %archive.display(), "binary archive published");
  }

  print_success(&format!("Installed {}", build.qualified_name()));
  print_stat("Source", &outcome.source.to_string());
  print_stat("Files", &outcome.new_files.len().to_string());
  print_stat("Time", &format_duration(outcome.install_time));
  if let Some(archive) = &outcome.published_archive {
    print_stat("Archive", &archive.display().to_string());
  }
  if !outcome.merged {
    print_info("Files were not merged into the orchestra root");
  }
  Ok(())
}
