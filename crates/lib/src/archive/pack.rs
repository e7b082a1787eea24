//! Creating and extracting archive files.

use std::fs::{self, File};
use std::io::BufReader;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, HeaderMode};
use tracing::debug;
use walkdir::WalkDir;

use super::ArchiveError;
use crate::consts::{ARCHIVE_EXTENSION, ARCHIVE_TMP_PREFIX};

const ARCHIVE_MODE: u32 = 0o644;

/// Pack the full contents of `source` into a gzip tar at `destination`.
///
/// The archive is written under a temporary name inside `repository` and then
/// renamed into place, so readers never see a partial file. Owners are
/// normalized to 0/0 and timestamps fixed. The published file is mode 0644 so
/// every user of a shared cache can read it.
pub fn create_archive(source: &Path, repository: &Path, destination: &Path) -> Result<(), ArchiveError> {
  fs::create_dir_all(repository).map_err(ArchiveError::io(repository))?;

  let temp = tempfile::Builder::new()
    .prefix(ARCHIVE_TMP_PREFIX)
    .suffix(&format!(".{}", ARCHIVE_EXTENSION))
    .tempfile_in(repository)
    .map_err(ArchiveError::io(repository))?;

  let encoder = GzEncoder::new(temp, Compression::default());
  let mut builder = Builder::new(encoder);
  builder.mode(HeaderMode::Deterministic);
  builder.follow_symlinks(false);

  for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| ArchiveError::Io {
      path: source.to_path_buf(),
      source: e.into(),
    })?;
    let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
    builder
      .append_path_with_name(entry.path(), relative)
      .map_err(ArchiveError::io(entry.path()))?;
  }

  let encoder = builder.into_inner().map_err(ArchiveError::io(destination))?;
  let temp = encoder.finish().map_err(ArchiveError::io(destination))?;
  temp
    .as_file()
    .set_permissions(fs::Permissions::from_mode(ARCHIVE_MODE))
    .map_err(ArchiveError::io(temp.path()))?;

  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent).map_err(ArchiveError::io(parent))?;
  }
  temp
    .persist(destination)
    .map_err(|e| ArchiveError::io(destination)(e.error))?;

  debug!(path = ?destination, "archive written");
  Ok(())
}

/// Unpack a gzip tar into `destination`, replacing existing entries.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
  fs::create_dir_all(destination).map_err(ArchiveError::io(destination))?;

  let file = File::open(archive).map_err(ArchiveError::io(archive))?;
  let mut unpacker = Archive::new(GzDecoder::new(BufReader::new(file)));
  unpacker.set_preserve_permissions(true);
  unpacker.set_overwrite(true);
  unpacker.unpack(destination).map_err(ArchiveError::io(archive))?;

  debug!(archive = ?archive, destination = ?destination, "archive extracted");
  Ok(())
}
