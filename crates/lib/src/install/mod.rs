//! Merge of staged trees into the shared root and the per-component records
//! that make it reversible.
//!
//! # Storage Layout
//!
//! ```text
//! <metadata_dir>/
//! ├── <component>.idx    # FileManifest: `component@build` then one path per line
//! └── <component>.json   # InstallMetadata
//! ```
//!
//! The `.idx` file doubles as the "is this component installed" marker.

mod index;
mod merge;
mod metadata;
mod uninstall;

pub use index::{index_directory, new_entries};
pub use merge::merge_tree;
pub use metadata::{
  FileManifest, InstallMetadata, installed_build, is_installed, load_file_list, load_metadata, save_file_list,
  save_metadata,
};
pub use uninstall::uninstall;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the files of an installation came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallSource {
  #[default]
  #[serde(rename = "build")]
  Build,
  #[serde(rename = "binary archives")]
  BinaryArchives,
}

impl fmt::Display for InstallSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InstallSource::Build => write!(f, "build"),
      InstallSource::BinaryArchives => write!(f, "binary archives"),
    }
  }
}

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse install metadata {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize install metadata: {0}")]
  Serialize(#[source] serde_json::Error),

  /// The first line of a file list is not `component@build`.
  #[error("malformed file list {0}")]
  MalformedFileList(PathBuf),
}

impl MetadataError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub(crate) fn walk(root: &Path) -> impl FnOnce(walkdir::Error) -> Self + '_ {
    move |e| Self::Io {
      path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
      source: e.into(),
    }
  }
}
