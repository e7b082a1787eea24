mod cmd;
mod manifest;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, print_error};

/// orchestra - install component builds into a shared root
#[derive(Parser)]
#[command(name = "orchestra")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the orchestra configuration file
  #[arg(short, long, global = true, env = "ORCHESTRA_CONFIG", default_value = "orchestra.toml")]
  config: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install a component, from a binary archive or by building it
  Install {
    /// Component to install, optionally as `component@build`
    component: String,

    /// Build to install (default: the component's default build)
    #[arg(short, long)]
    build: Option<String>,

    /// Install even if the requested build is already installed
    #[arg(short, long)]
    force: bool,

    /// Do not merge files into the orchestra root
    #[arg(long)]
    no_merge: bool,

    /// Publish a binary archive after building
    #[arg(long)]
    create_binary_archive: bool,

    /// Keep the temporary root after installing
    #[arg(long)]
    keep_tmproot: bool,

    /// Run the build's tests
    #[arg(long)]
    test: bool,

    /// Only install from binary archives
    #[arg(long, conflicts_with = "no_binary_archives")]
    no_build: bool,

    /// Never install from binary archives
    #[arg(long)]
    no_binary_archives: bool,
  },

  /// Remove an installed component from the orchestra root
  Uninstall {
    /// Component to uninstall
    component: String,
  },

  /// Show what is installed for a component
  Status {
    /// Component to inspect
    component: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Install {
      component,
      build,
      force,
      no_merge,
      create_binary_archive,
      keep_tmproot,
      test,
      no_build,
      no_binary_archives,
    } => cmd::cmd_install(
      &cli.config,
      &cmd::InstallArgs {
        component,
        build,
        force,
        no_merge,
        create_binary_archive,
        keep_tmproot,
        test,
        no_build,
        no_binary_archives,
      },
    ),
    Commands::Uninstall { component } => cmd::cmd_uninstall(&cli.config, &component),
    Commands::Status { component, output } => cmd::cmd_status(&cli.config, &component, output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
