use std::fmt;

/// CPU architecture variants supported by orchestra
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  Aarch64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }

  /// Returns the ELF `e_machine` value of binaries built for this architecture
  pub fn elf_machine(&self) -> u16 {
    match self {
      Self::X86_64 => 62,
      Self::Aarch64 => 183,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn elf_machine_values() {
    assert_eq!(Arch::X86_64.elf_machine(), 62);
    assert_eq!(Arch::Aarch64.elf_machine(), 183);
  }
}
