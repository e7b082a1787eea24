use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{InstallSource, MetadataError};
use crate::component::Build;
use crate::config::InstallConfig;

/// Persisted record of a component's current installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallMetadata {
  pub component: String,
  pub build: String,
  pub self_hash: String,
  pub recursive_hash: String,
  pub source: InstallSource,
  /// Set once the user asked for this component explicitly. Never cleared by
  /// automated reinstalls.
  pub manually_installed: bool,
  #[serde(with = "seconds")]
  pub install_time: Duration,
  /// Archive location relative to a repository's platform directory.
  pub binary_archive_path: String,
}

impl InstallMetadata {
  pub fn from_build(build: &Build) -> Self {
    Self {
      component: build.component.name.clone(),
      build: build.name.clone(),
      self_hash: build.self_hash.clone(),
      recursive_hash: build.recursive_hash.clone(),
      binary_archive_path: build.binary_archive_path(),
      ..Default::default()
    }
  }

  /// Record a new installation of `build`.
  ///
  /// Every field is overwritten except `manually_installed`, which only ever
  /// goes from `false` to `true`.
  pub fn update(&mut self, build: &Build, source: InstallSource, install_time: Duration, manually_installed: bool) {
    self.component = build.component.name.clone();
    self.build = build.name.clone();
    self.self_hash = build.self_hash.clone();
    self.recursive_hash = build.recursive_hash.clone();
    self.source = source;
    self.manually_installed |= manually_installed;
    self.install_time = install_time;
    self.binary_archive_path = build.binary_archive_path();
  }
}

mod seconds {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer, de::Error};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
  }
}

/// Load the metadata of `component`, `None` when it has never been installed.
pub fn load_metadata(config: &InstallConfig, component: &str) -> Result<Option<InstallMetadata>, MetadataError> {
  let path = config.metadata_path(component);
  let content = match fs::read_to_string(&path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(MetadataError::Io { path, source: e }),
  };
  serde_json::from_str(&content)
    .map(Some)
    .map_err(|source| MetadataError::Parse { path, source })
}

/// Write `metadata` to the metadata path of its component.
///
/// The file is written next to its destination and renamed into place.
pub fn save_metadata(config: &InstallConfig, metadata: &InstallMetadata) -> Result<(), MetadataError> {
  let path = config.metadata_path(&metadata.component);
  let content = serde_json::to_string_pretty(metadata).map_err(MetadataError::Serialize)?;
  write_atomic(&path, &content)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), MetadataError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(MetadataError::io(parent))?;
  }
  let mut temp_path = path.as_os_str().to_owned();
  temp_path.push(".tmp");
  let temp_path = PathBuf::from(temp_path);
  fs::write(&temp_path, content).map_err(MetadataError::io(&temp_path))?;
  fs::rename(&temp_path, path).map_err(MetadataError::io(path))
}

/// The list of files a component installed into the shared root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManifest {
  pub component: String,
  pub build: String,
  /// Paths relative to the shared root, in index order.
  pub files: Vec<PathBuf>,
}

impl FileManifest {
  pub fn new(build: &Build, files: Vec<PathBuf>) -> Self {
    Self {
      component: build.component.name.clone(),
      build: build.name.clone(),
      files,
    }
  }

  pub fn render(&self) -> String {
    let mut out = format!("{}@{}\n", self.component, self.build);
    for file in &self.files {
      out.push_str(&file.to_string_lossy());
      out.push('\n');
    }
    out
  }

  /// Parse the on-disk form. Returns `None` when the header is missing.
  pub fn parse(content: &str) -> Option<Self> {
    let mut lines = content.lines();
    let (component, build) = lines.next()?.trim().split_once('@')?;
    if component.is_empty() || build.is_empty() {
      return None;
    }
    Some(Self {
      component: component.to_string(),
      build: build.to_string(),
      files: lines.filter(|l| !l.is_empty()).map(PathBuf::from).collect(),
    })
  }
}

pub fn save_file_list(config: &InstallConfig, manifest: &FileManifest) -> Result<(), MetadataError> {
  write_atomic(&config.file_list_path(&manifest.component), &manifest.render())
}

/// Load the file list of `component`, `None` when it is not installed.
pub fn load_file_list(config: &InstallConfig, component: &str) -> Result<Option<FileManifest>, MetadataError> {
  let path = config.file_list_path(component);
  let content = match fs::read_to_string(&path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(MetadataError::Io { path, source: e }),
  };
  FileManifest::parse(&content)
    .map(Some)
    .ok_or(MetadataError::MalformedFileList(path))
}

/// Name of the installed build of `component`, if any.
pub fn installed_build(config: &InstallConfig, component: &str) -> Result<Option<String>, MetadataError> {
  Ok(load_file_list(config, component)?.map(|m| m.build))
}

/// Whether `component` is installed, optionally as exactly `build`.
pub fn is_installed(config: &InstallConfig, component: &str, build: Option<&str>) -> Result<bool, MetadataError> {
  Ok(match installed_build(config, component)? {
    Some(installed) => build.is_none_or(|wanted| wanted == installed),
    None => false,
  })
}
