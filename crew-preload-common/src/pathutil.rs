//! Path utilities (C2): `PATH` search, basename, system-prefix tests.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};

/// POSIX-mandated fallback if `confstr(_CS_PATH, ...)` itself fails.
const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// `confstr(_CS_PATH, ...)`, the same call `main.c`'s `search_in_path()`
/// makes to learn the platform's default `PATH` when the environment
/// doesn't supply one. Not part of `nix::unistd`, so declared directly
/// against the `libc` crate's binding the way `gnu_get_libc_version` is in
/// `config::state`.
fn confstr_path() -> String {
    unsafe {
        let needed = libc::confstr(libc::_CS_PATH, std::ptr::null_mut(), 0);
        if needed == 0 {
            return DEFAULT_PATH.to_string();
        }
        let mut buf = vec![0u8; needed];
        let written = libc::confstr(libc::_CS_PATH, buf.as_mut_ptr() as *mut libc::c_char, buf.len());
        if written == 0 || written > buf.len() {
            return DEFAULT_PATH.to_string();
        }
        // `written` counts the trailing NUL; trim it before decoding.
        let end = written - 1;
        std::str::from_utf8(&buf[..end])
            .map(str::to_string)
            .unwrap_or_else(|_| DEFAULT_PATH.to_string())
    }
}

/// Result of searching `PATH` for an executable (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSearch {
    Found(PathBuf),
    PermissionDenied,
    NotFound,
}

/// Search `PATH` (or the platform default if unset/empty) for the first
/// entry `entry` such that `entry/name` is executable. Left-to-right,
/// first-match-wins (§4.2).
pub fn search_in_path(name: &str) -> PathSearch {
    let path_var = std::env::var("PATH").unwrap_or_default();
    let path_var = if path_var.is_empty() {
        confstr_path()
    } else {
        path_var
    };

    let mut found_but_not_executable = false;

    for entry in path_var.split(':') {
        let entry = if entry.is_empty() { "." } else { entry };
        let candidate = Path::new(entry).join(name);

        match is_executable(&candidate) {
            Ok(true) => return PathSearch::Found(candidate),
            Ok(false) => found_but_not_executable = true,
            Err(_) => {}
        }
    }

    if found_but_not_executable {
        PathSearch::PermissionDenied
    } else {
        PathSearch::NotFound
    }
}

/// `access(F_OK)` then `access(X_OK)`. Returns `Ok(false)` (rather than an
/// error) when the file exists but lacks the execute bit, so callers can
/// distinguish "not found" from "found, not executable".
pub fn is_executable(path: &Path) -> std::io::Result<bool> {
    let cpath = path_to_cstring(path)?;
    if access(cpath.as_c_str(), AccessFlags::F_OK).is_err() {
        return Ok(false);
    }
    Ok(access(cpath.as_c_str(), AccessFlags::X_OK).is_ok())
}

fn path_to_cstring(path: &Path) -> std::io::Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))
}

/// True iff `path` begins with any `SYSTEM_EXE_PREFIXES` element (§4.2).
pub fn is_under_system_prefix(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    crate::config::constants::SYSTEM_EXE_PREFIXES
        .iter()
        .any(|prefix| path_str.starts_with(prefix))
}

/// Last slash-separated component of `path` (§4.2).
pub fn basename(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_in_path_finds_first_match() {
        std::env::set_var("PATH", "/nonexistent:/usr/bin:/bin");
        match search_in_path("ls") {
            PathSearch::Found(p) => assert!(p.starts_with("/usr/bin") || p.starts_with("/bin")),
            other => panic!("expected ls to be found, got {:?}", other),
        }
    }

    #[test]
    fn search_in_path_not_found() {
        std::env::set_var("PATH", "/nonexistent");
        assert_eq!(
            search_in_path("definitely-not-a-real-binary-xyz"),
            PathSearch::NotFound
        );
    }

    #[test]
    fn system_prefix_detection() {
        assert!(is_under_system_prefix(Path::new("/usr/bin/ls")));
        assert!(is_under_system_prefix(Path::new("/bin/sh")));
        assert!(!is_under_system_prefix(Path::new("/usr/local/bin/ruby")));
    }

    #[test]
    fn basename_extracts_last_component() {
        assert_eq!(basename(Path::new("/usr/bin/ls")), "ls");
        assert_eq!(basename(Path::new("ls")), "ls");
    }
}
