//! RPATH relocation of ELF binaries.
//!
//! This module only decides which files are eligible and what the sentinel
//! strings should become; rewriting the dynamic string table is left to the
//! external patcher tool.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::TransformError;
use crate::config::InstallConfig;
use crate::platform::arch::Arch;
use crate::runner::{Environment, ExternalCommand, ScriptRunner, run_checked};
use crate::util::path::relative_path;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const PT_DYNAMIC: u32 = 2;
const HEADER_LEN: usize = 64;

/// The parts of an ELF header that decide patch eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfInfo {
  pub file_type: u16,
  pub machine: u16,
  /// Whether a `PT_DYNAMIC` program header is present.
  pub dynamic: bool,
}

impl ElfInfo {
  /// Shared objects and dynamically linked executables built for `arch`.
  pub fn is_patchable(&self, arch: Arch) -> bool {
    self.machine == arch.elf_machine() && (self.file_type == ET_DYN || (self.file_type == ET_EXEC && self.dynamic))
  }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
  u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
  u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
  let mut buf = [0u8; 8];
  buf.copy_from_slice(&bytes[offset..offset + 8]);
  u64::from_le_bytes(buf)
}

/// Read the ELF header of `path`.
///
/// Returns `None` for anything that is not a little-endian 64-bit ELF file.
pub fn read_elf_info(path: &Path) -> io::Result<Option<ElfInfo>> {
  let mut file = File::open(path)?;
  let mut header = [0u8; HEADER_LEN];
  let mut read = 0;
  while read < HEADER_LEN {
    let n = file.read(&mut header[read..])?;
    if n == 0 {
      break;
    }
    read += n;
  }

  if read < HEADER_LEN || &header[..4] != ELF_MAGIC || header[4] != ELFCLASS64 || header[5] != ELFDATA2LSB {
    return Ok(None);
  }

  let file_type = u16_at(&header, 16);
  let machine = u16_at(&header, 18);
  let phoff = u64_at(&header, 32);
  let phentsize = u16_at(&header, 54) as usize;
  let phnum = u16_at(&header, 56) as usize;

  let table_len = phentsize * phnum;
  let file_len = file.metadata()?.len();
  let table_fits = phoff.checked_add(table_len as u64).is_some_and(|end| end <= file_len);

  let mut dynamic = false;
  if phentsize >= 4 && phnum > 0 && table_fits {
    let mut table = vec![0u8; table_len];
    file.seek(SeekFrom::Start(phoff))?;
    if file.read_exact(&mut table).is_ok() {
      dynamic = table.chunks_exact(phentsize).any(|ph| u32_at(ph, 0) == PT_DYNAMIC);
    }
  }

  Ok(Some(ElfInfo {
    file_type,
    machine,
    dynamic,
  }))
}

/// `$ORIGIN`-relative path from the directory of `binary` back to `prefix`.
pub fn rpath_replacement(prefix: &Path, binary: &Path) -> String {
  let dir = binary
    .parent()
    .and_then(|d| d.strip_prefix(prefix).ok())
    .unwrap_or(Path::new(""));
  format!("$ORIGIN/{}", relative_path(dir, Path::new("")).display())
}

fn is_executable_file(path: &Path) -> io::Result<bool> {
  let meta = fs::symlink_metadata(path)?;
  Ok(meta.file_type().is_file() && meta.permissions().mode() & 0o111 != 0)
}

/// Ask the patcher to relocate every eligible binary below `prefix`.
///
/// Both the configured RPATH placeholder and the literal install root are
/// replaced. Returns the patched files.
pub async fn fix_rpaths<R: ScriptRunner>(
  runner: &R,
  env: &Environment,
  config: &InstallConfig,
  prefix: &Path,
  arch: Arch,
) -> Result<Vec<PathBuf>, TransformError> {
  let root = config.orchestra_root.to_string_lossy().to_string();
  let mut sentinels: Vec<&str> = Vec::new();
  if let Some(placeholder) = &config.rpath_placeholder {
    sentinels.push(placeholder);
  }
  sentinels.push(&root);

  let mut patched = Vec::new();
  for entry in WalkDir::new(prefix).sort_by_file_name() {
    let entry = entry.map_err(TransformError::walk(prefix))?;
    let path = entry.path();
    if !entry.file_type().is_file() || !is_executable_file(path).map_err(TransformError::io(path))? {
      continue;
    }
    let Some(info) = read_elf_info(path).map_err(TransformError::io(path))? else {
      continue;
    };
    if !info.is_patchable(arch) {
      debug!(path = ?path, info = ?info, "skipping ELF file");
      continue;
    }

    let replacement = rpath_replacement(prefix, path);
    info!(path = ?path, rpath = %replacement, "setting rpath");
    for sentinel in &sentinels {
      let cmd = ExternalCommand::new(&config.elf_patcher)
        .path_arg(path)
        .arg(*sentinel)
        .arg(&replacement)
        .arg("/")
        .captured();
      run_checked(runner, &cmd, env)
        .await
        .map_err(|source| TransformError::Patch {
          path: path.to_path_buf(),
          source,
        })?;
    }
    patched.push(path.to_path_buf());
  }

  Ok(patched)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{RecordingRunner, write_elf};
  use tempfile::TempDir;

  #[test]
  fn eligibility_requires_arch_and_dynamic_linking() {
    let shared = ElfInfo {
      file_type: ET_DYN,
      machine: 62,
      dynamic: true,
    };
    assert!(shared.is_patchable(Arch::X86_64));
    assert!(!shared.is_patchable(Arch::Aarch64));

    let static_exec = ElfInfo {
      file_type: ET_EXEC,
      machine: 62,
      dynamic: false,
    };
    assert!(!static_exec.is_patchable(Arch::X86_64));

    let dynamic_exec = ElfInfo { dynamic: true, ..static_exec };
    assert!(dynamic_exec.is_patchable(Arch::X86_64));

    let object = ElfInfo {
      file_type: 1,
      machine: 62,
      dynamic: false,
    };
    assert!(!object.is_patchable(Arch::X86_64));
  }

  #[test]
  fn reads_synthetic_header() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("libz.so");
    write_elf(&path, ET_DYN, 62, true);

    assert_eq!(
      read_elf_info(&path).unwrap(),
      Some(ElfInfo {
        file_type: ET_DYN,
        machine: 62,
        dynamic: true,
      })
    );
  }

  #[test]
  fn oversized_program_header_table_is_ignored() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("crafted");
    write_elf(&path, ET_EXEC, 62, true);
    let mut bytes = fs::read(&path).unwrap();
    bytes[54..56].copy_from_slice(&u16::MAX.to_le_bytes());
    bytes[56..58].copy_from_slice(&u16::MAX.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let info = read_elf_info(&path).unwrap().unwrap();
    assert!(!info.dynamic);
    assert!(!info.is_patchable(Arch::X86_64));
  }

  #[test]
  fn non_elf_is_none() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("script");
    fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
    assert_eq!(read_elf_info(&script).unwrap(), None);

    let short = temp.path().join("short");
    fs::write(&short, b"\x7fELF").unwrap();
    assert_eq!(read_elf_info(&short).unwrap(), None);
  }

  #[test]
  fn replacement_is_relative_to_binary_dir() {
    let prefix = Path::new("/stage/opt/root");
    assert_eq!(rpath_replacement(prefix, &prefix.join("bin/tool")), "$ORIGIN/..");
    assert_eq!(rpath_replacement(prefix, &prefix.join("lib64/gcc/x/libfoo.so")), "$ORIGIN/../../..");
    assert_eq!(rpath_replacement(prefix, &prefix.join("tool")), "$ORIGIN/.");
  }

  #[tokio::test]
  async fn patches_eligible_binaries_for_each_sentinel() {
    let temp = TempDir::new().unwrap();
    let mut config = InstallConfig::new("/opt/root", temp.path().join("tmp"), temp.path().join("archives"));
    config.rpath_placeholder = Some("@@RPATH@@".to_string());
    let prefix = config.staged_prefix();
    fs::create_dir_all(prefix.join("bin")).unwrap();
    fs::create_dir_all(prefix.join("lib64")).unwrap();

    write_elf(&prefix.join("bin/tool"), ET_EXEC, Arch::X86_64.elf_machine(), true);
    write_elf(&prefix.join("bin/static"), ET_EXEC, Arch::X86_64.elf_machine(), false);
    write_elf(&prefix.join("lib64/libz.so"), ET_DYN, Arch::X86_64.elf_machine(), true);
    fs::set_permissions(prefix.join("lib64/libz.so"), fs::Permissions::from_mode(0o644)).unwrap();
    fs::write(prefix.join("bin/script"), "#!/bin/sh\n").unwrap();
    fs::set_permissions(prefix.join("bin/script"), fs::Permissions::from_mode(0o755)).unwrap();

    let runner = RecordingRunner::default();
    let patched = fix_rpaths(&runner, &Environment::new(), &config, &prefix, Arch::X86_64)
      .await
      .unwrap();

    assert_eq!(patched, vec![prefix.join("bin/tool")]);
    let tool = prefix.join("bin/tool").to_string_lossy().to_string();
    assert_eq!(
      runner.commands(),
      vec![
        format!("elf-replace-dynstr {} @@RPATH@@ $ORIGIN/.. /", tool),
        format!("elf-replace-dynstr {} /opt/root $ORIGIN/.. /", tool),
      ]
    );
  }

  #[tokio::test]
  async fn patcher_failure_is_patch_error() {
    let temp = TempDir::new().unwrap();
    let config = InstallConfig::new("/opt/root", temp.path().join("tmp"), temp.path().join("archives"));
    let prefix = config.staged_prefix();
    fs::create_dir_all(prefix.join("bin")).unwrap();
    write_elf(&prefix.join("bin/tool"), ET_DYN, Arch::X86_64.elf_machine(), true);

    let runner = RecordingRunner::failing("elf-replace-dynstr");
    let result = fix_rpaths(&runner, &Environment::new(), &config, &prefix, Arch::X86_64).await;

    assert!(matches!(result, Err(TransformError::Patch { .. })));
  }
}
