//! Constants shared across the install engine.

/// Application name, used for default directory names.
pub const APP_NAME: &str = "orchestra";

/// Branch name used for alias symlinks when the configuration directory's
/// branch cannot be determined.
pub const DEFAULT_CONFIG_BRANCH: &str = "master";

/// Directory entry marking the root of an archive repository.
pub const REPOSITORY_MARKER: &str = ".git";

/// Extension of every binary archive and alias symlink.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Prefix of the temporary file an archive is written to before being renamed.
pub const ARCHIVE_TMP_PREFIX: &str = "_tmp_";

/// Branch/commit pair used for alias symlinks of components without source control.
pub const NO_SOURCE_CONTROL: &str = "none";

/// Default external tool rewriting ELF dynamic string tables.
pub const DEFAULT_ELF_PATCHER: &str = "elf-replace-dynstr";
