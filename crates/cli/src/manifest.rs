//! The orchestra TOML file: install configuration plus component descriptions.
//!
//! ```toml
//! [config]
//! orchestra_root = "/opt/orchestra/root"
//! tmp_root = "/tmp/orchestra"
//! binary_archives = "/opt/orchestra/archives"
//! archive_repositories = ["public"]
//!
//! [components.zlib]
//! license = "LICENSE"
//! default_build = "optimized"
//!
//! [components.zlib.builds.optimized]
//! recursive_hash = "5f0c..."
//! install = "make -C \"$BUILD_DIR\" install"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use orchestra_lib::component::{Build, Component};
use orchestra_lib::config::InstallConfig;
use orchestra_lib::runner::ExternalCommand;

#[derive(Debug, Deserialize)]
pub struct Manifest {
  pub config: InstallConfig,
  #[serde(default)]
  pub components: BTreeMap<String, ComponentSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
  pub license: Option<String>,
  pub binary_archives: Option<String>,
  #[serde(default)]
  pub skip_post_install: bool,
  pub default_build: Option<String>,
  /// Branch to commit mapping of the component's source checkout.
  pub heads: Option<BTreeMap<String, String>>,
  #[serde(default)]
  pub builds: BTreeMap<String, BuildSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
  pub recursive_hash: String,
  pub self_hash: Option<String>,
  /// Commit the archive filename is derived from. Defaults to `none`.
  pub commit: Option<String>,
  /// Shell script installing the build into `$DESTDIR$ORCHESTRA_ROOT`.
  #[serde(default = "default_install")]
  pub install: String,
  #[serde(default)]
  pub run_tests: bool,
  #[serde(default)]
  pub disable_debug: bool,
  pub build_dir: Option<PathBuf>,
  pub source_dir: Option<PathBuf>,
}

fn default_install() -> String {
  "true".to_string()
}

/// Split `component@build` into its parts.
pub fn parse_component_name(spec: &str) -> (&str, Option<&str>) {
  match spec.split_once('@') {
    Some((component, build)) if !build.is_empty() => (component, Some(build)),
    Some((component, _)) => (component, None),
    None => (spec, None),
  }
}

impl Manifest {
  pub fn from_toml_str(content: &str) -> Result<Self> {
    let manifest: Manifest = toml::from_str(content).context("Failed to parse orchestra configuration")?;
    manifest.config.validate()?;
    Ok(manifest)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read configuration {}", path.display()))?;
    Self::from_toml_str(&content).with_context(|| format!("Invalid configuration {}", path.display()))
  }

  /// Resolve a build of `component`.
  ///
  /// Without an explicit build name the component's `default_build` is used,
  /// falling back to its first build in name order.
  pub fn build(&self, component: &str, build: Option<&str>) -> Result<Build> {
    let spec = self
      .components
      .get(component)
      .ok_or_else(|| anyhow!("Unknown component: {}", component))?;

    let build_name = match build.or(spec.default_build.as_deref()) {
      Some(name) => name,
      None => spec
        .builds
        .keys()
        .next()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Component {} has no builds", component))?,
    };
    let build_spec = spec
      .builds
      .get(build_name)
      .ok_or_else(|| anyhow!("Unknown build {}@{}", component, build_name))?;

    let mut desc = Component::new(component);
    desc.license = spec.license.clone();
    desc.binary_archives = spec.binary_archives.clone();
    desc.skip_post_install = spec.skip_post_install;
    desc.heads = spec.heads.clone();

    let mut built = Build::new(desc, build_name, &build_spec.recursive_hash)
      .with_install_script(ExternalCommand::shell(&build_spec.install))
      .with_dirs(
        build_spec.build_dir.clone().unwrap_or_default(),
        build_spec.source_dir.clone().unwrap_or_default(),
      );
    if let Some(commit) = &build_spec.commit {
      built = built.with_commit(commit);
    }
    if let Some(self_hash) = &build_spec.self_hash {
      built.self_hash = self_hash.clone();
    }
    built.run_tests = build_spec.run_tests;
    built.disable_debug = build_spec.disable_debug;
    Ok(built)
  }
}
