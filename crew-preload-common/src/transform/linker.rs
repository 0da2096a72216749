//! Linker substitution (§4.7 step 8): when compile hacks are enabled and the
//! resolved executable is a linker driver, prefer `mold` and force the
//! distribution's dynamic linker via `--dynamic-linker`.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use log::warn;

use crate::config::constants::{CREW_INTERPRETER, LINKER_NAMES};
use crate::pathutil::{self, PathSearch};

/// If `basename` names a known linker driver, decide the substitute binary
/// (mold, when available and not disabled) and whether `--dynamic-linker`
/// needs appending.
pub fn is_linker(basename: &str) -> bool {
    LINKER_NAMES.contains(&basename)
}

pub struct LinkerSubstitution {
    pub new_path: Option<PathBuf>,
}

/// §4.7 step 8: find `mold` in `PATH` unless the driver already is
/// `mold`/`ld.mold` or `no_mold` is set. Degrades gracefully (§7): if
/// `mold` cannot be found, the original linker keeps running and a warning
/// is logged, rather than failing the whole exec.
pub fn substitute_if_linker(resolved_path: &Path, no_mold: bool) -> LinkerSubstitution {
    let basename = pathutil::basename(resolved_path);
    if !is_linker(basename) {
        return LinkerSubstitution { new_path: None };
    }

    if basename == "mold" || basename == "ld.mold" || no_mold {
        return LinkerSubstitution { new_path: None };
    }

    match pathutil::search_in_path("mold") {
        PathSearch::Found(path) => LinkerSubstitution {
            new_path: Some(path),
        },
        _ => {
            warn!("compile hacks enabled but mold not found in PATH, keeping {}", basename);
            LinkerSubstitution { new_path: None }
        }
    }
}

/// Append `--dynamic-linker <CREW_INTERPRETER>` to argv (§4.7 step 8).
pub fn append_dynamic_linker_flag(argv: &mut Vec<CString>) {
    argv.push(CString::new("--dynamic-linker").unwrap());
    argv.push(CString::new(CREW_INTERPRETER).unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_linker_names() {
        for name in LINKER_NAMES {
            assert!(is_linker(name));
        }
        assert!(!is_linker("gcc"));
    }

    #[test]
    fn append_adds_two_argv_entries() {
        let mut argv = vec![CString::new("ld").unwrap()];
        append_dynamic_linker_flag(&mut argv);
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[1].to_str().unwrap(), "--dynamic-linker");
        assert_eq!(argv[2].to_str().unwrap(), CREW_INTERPRETER);
    }
}
