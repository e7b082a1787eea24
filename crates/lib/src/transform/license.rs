use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::TransformError;
use crate::component::Build;
use crate::config::InstallConfig;

/// Copy the component's declared license into the staging root.
///
/// The build directory is searched before the source directory; unset
/// directories are skipped. Returns the staged destination, or `Ok` of an
/// empty path when no license is declared.
pub fn copy_license(config: &InstallConfig, build: &Build) -> Result<PathBuf, TransformError> {
  let Some(license) = &build.component.license else {
    return Ok(PathBuf::new());
  };

  let searched: Vec<PathBuf> = [&build.build_dir, &build.source_dir]
    .into_iter()
    .filter(|dir| !dir.as_os_str().is_empty())
    .map(|dir| dir.join(license))
    .collect();

  let Some(source) = searched.iter().find(|candidate| candidate.is_file()) else {
    return Err(TransformError::LicenseNotFound {
      license: license.clone(),
      searched,
    });
  };

  let destination = config.staged_path(&config.license_path(&build.component.name, license));
  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent).map_err(TransformError::io(parent))?;
  }
  fs::copy(source, &destination).map_err(TransformError::io(source))?;
  debug!(from = ?source, to = ?destination, "copied license");

  Ok(destination)
}
