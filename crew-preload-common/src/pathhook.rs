//! Path hook adapter (C6): rewrite selected filesystem paths on intercepted
//! file-access calls (`access`/`stat`/`lstat`/`statx`/`open`/`open64`/
//! `fopen`/`fopen64`), per §4.6.

use std::path::{Path, PathBuf};

use crate::audit;
use crate::config::constants::GLIBC_PREFIX;
use crate::pathutil::basename;

/// Rewrite `path` when `compile_hacks` is enabled, it begins with
/// `/usr/local/lib` or `/usr/lib`, and its basename is one of the
/// distribution's own shared objects. Returns the original path unchanged
/// in every other case (§4.6, §8: "the original call receives `p`
/// unchanged and returns its own result").
///
/// Takes `compile_hacks` explicitly rather than reaching into the global
/// state itself, so the rewrite rule stays a pure function of its inputs.
pub fn maybe_rewrite(path: &Path, compile_hacks: bool) -> PathBuf {
    if !compile_hacks {
        return path.to_path_buf();
    }

    let path_str = path.to_string_lossy();
    if !(path_str.starts_with("/usr/local/lib") || path_str.starts_with("/usr/lib")) {
        return path.to_path_buf();
    }

    let name = basename(path);
    if name.is_empty() || !audit::is_glibc_provided(name) {
        return path.to_path_buf();
    }

    PathBuf::from(format!("{}/{}", GLIBC_PREFIX, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_unrelated_paths_alone() {
        let path = Path::new("/etc/hostname");
        assert_eq!(maybe_rewrite(path, true), path.to_path_buf());
    }

    #[test]
    fn disabled_without_compile_hacks() {
        let path = Path::new("/usr/lib/libfoo.so");
        assert_eq!(maybe_rewrite(path, false), path.to_path_buf());
    }
}
