//! Install configuration.
//!
//! [`InstallConfig`] is constructed once per invocation and threaded through
//! every step. It owns every path the engine touches and derives the
//! [`Environment`] handed to external commands.

use std::path::{Component as PathComponent, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::Build;
use crate::consts::{APP_NAME, DEFAULT_ELF_PATCHER};
use crate::platform;
use crate::runner::{self, Environment};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse configuration: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

/// Paths and settings shared by every install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
  /// Shared install root every component is merged into.
  pub orchestra_root: PathBuf,
  /// Staging root for this invocation. Must be unique per concurrent install.
  pub tmp_root: PathBuf,
  /// Directory containing one checkout per archive repository.
  pub binary_archives: PathBuf,
  /// Archive repository names, in lookup order.
  #[serde(default)]
  pub archive_repositories: Vec<String>,
  #[serde(default = "platform::archive_tag")]
  pub platform_tag: String,
  /// Directory holding the orchestration configuration, queried for its branch.
  #[serde(default)]
  pub dotdir: Option<PathBuf>,
  /// Where manifests and metadata are kept. Defaults to `<root>/share/orchestra`.
  #[serde(default)]
  pub metadata_dir: Option<PathBuf>,
  /// Where licenses are installed. Defaults to `<root>/share/licenses`.
  #[serde(default)]
  pub license_dir: Option<PathBuf>,
  #[serde(default)]
  pub rpath_placeholder: Option<String>,
  #[serde(default = "default_elf_patcher")]
  pub elf_patcher: String,
}

fn default_elf_patcher() -> String {
  DEFAULT_ELF_PATCHER.to_string()
}

impl InstallConfig {
  pub fn new(orchestra_root: impl Into<PathBuf>, tmp_root: impl Into<PathBuf>, binary_archives: impl Into<PathBuf>) -> Self {
    Self {
      orchestra_root: orchestra_root.into(),
      tmp_root: tmp_root.into(),
      binary_archives: binary_archives.into(),
      archive_repositories: Vec::new(),
      platform_tag: platform::archive_tag(),
      dotdir: None,
      metadata_dir: None,
      license_dir: None,
      rpath_placeholder: None,
      elf_patcher: default_elf_patcher(),
    }
  }

  pub fn with_repositories<I, S>(mut self, repositories: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.archive_repositories = repositories.into_iter().map(Into::into).collect();
    self
  }

  /// Parse and validate a configuration from TOML text.
  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Check the invariants every path computation relies on.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.orchestra_root.is_absolute() {
      return Err(ConfigError::Invalid(format!(
        "orchestra_root must be absolute: {}",
        self.orchestra_root.display()
      )));
    }
    if !self.tmp_root.is_absolute() {
      return Err(ConfigError::Invalid(format!(
        "tmp_root must be absolute: {}",
        self.tmp_root.display()
      )));
    }
    if self.tmp_root.starts_with(&self.orchestra_root) || self.orchestra_root.starts_with(&self.tmp_root) {
      return Err(ConfigError::Invalid(
        "tmp_root and orchestra_root must not contain each other".to_string(),
      ));
    }
    Ok(())
  }

  pub fn metadata_dir(&self) -> PathBuf {
    self
      .metadata_dir
      .clone()
      .unwrap_or_else(|| self.orchestra_root.join("share").join(APP_NAME))
  }

  pub fn license_dir(&self) -> PathBuf {
    self
      .license_dir
      .clone()
      .unwrap_or_else(|| self.orchestra_root.join("share").join("licenses"))
  }

  /// Installed file list (manifest) of a component.
  pub fn file_list_path(&self, component: &str) -> PathBuf {
    self.metadata_dir().join(format!("{}.idx", component))
  }

  /// Install metadata record of a component.
  pub fn metadata_path(&self, component: &str) -> PathBuf {
    self.metadata_dir().join(format!("{}.json", component))
  }

  /// Final location of a component's license file.
  pub fn license_path(&self, component: &str, license: &str) -> PathBuf {
    let file_name = Path::new(license)
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| license.to_string());
    self.license_dir().join(component).join(file_name)
  }

  /// Where the shared root appears inside the staging root (`$TMP_ROOT$ORCHESTRA_ROOT`).
  pub fn staged_prefix(&self) -> PathBuf {
    self.staged_path(&self.orchestra_root)
  }

  /// Map an absolute path onto the staging root.
  pub fn staged_path(&self, absolute: &Path) -> PathBuf {
    let relative: PathBuf = absolute
      .components()
      .filter(|c| !matches!(c, PathComponent::RootDir | PathComponent::Prefix(_)))
      .collect();
    self.tmp_root.join(relative)
  }

  /// Express a path under the shared root relative to it.
  pub fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(&self.orchestra_root).ok().map(Path::to_path_buf)
  }

  /// Directory of an archive repository's platform-specific tree.
  pub fn repository_platform_dir(&self, repository: &str) -> PathBuf {
    self.binary_archives.join(repository).join(&self.platform_tag)
  }

  /// The environment for every external command run on behalf of `build`.
  pub fn environment(&self, build: &Build) -> Environment {
    let mut env = Environment::new()
      .with(runner::TMP_ROOT, self.tmp_root.to_string_lossy())
      .with(runner::ORCHESTRA_ROOT, self.orchestra_root.to_string_lossy())
      .with(runner::DESTDIR, self.tmp_root.to_string_lossy())
      .with(runner::BINARY_ARCHIVES, self.binary_archives.to_string_lossy())
      .with(runner::RUN_TESTS, "0")
      .with(runner::BUILD_DIR, build.build_dir.to_string_lossy())
      .with(runner::SOURCE_DIR, build.source_dir.to_string_lossy());
    if let Some(dotdir) = &self.dotdir {
      env = env.with(runner::ORCHESTRA_DOTDIR, dotdir.to_string_lossy());
    }
    if let Some(placeholder) = &self.rpath_placeholder {
      env = env.with(runner::RPATH_PLACEHOLDER, placeholder.as_str());
    }
    env
  }
}
