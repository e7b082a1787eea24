pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use std::fmt;

/// Platform identifier combining architecture and OS (e.g., "linux-x86-64")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the tag naming this platform's directory in the archive cache
  /// (e.g., "linux-x86-64").
  pub fn archive_tag(&self) -> String {
    format!("{}-{}", self.os, self.arch.as_str().replace('_', "-"))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.archive_tag())
  }
}

/// Returns the archive tag for the current system, falling back to
/// `linux-x86-64` on unsupported platforms.
pub fn archive_tag() -> String {
  Platform::current()
    .unwrap_or(Platform::new(Arch::X86_64, Os::Linux))
    .archive_tag()
}
