//! Audit rewriter (C5): per-request shared-object name rewrite against a
//! fixed rule set (§4.5), and the audit module lifecycle shared bits (§4.8).

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::config::constants::GLIBC_PREFIX;
use crate::{glibc_cache, pathutil};

/// Outcome of an `la_objsearch`-style lookup (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRewrite {
    /// Return the name/path unchanged, to be resolved by the loader as usual.
    Verbatim(String),
    /// Substitute this path instead.
    Rewritten(String),
    /// Tell the loader this object cannot be resolved.
    NotFound,
}

static CURRENT_EXE: OnceCell<PathBuf> = OnceCell::new();

fn current_executable() -> &'static Path {
    CURRENT_EXE
        .get_or_init(|| {
            std::fs::read_link("/proc/self/exe").unwrap_or_else(|_| PathBuf::from(""))
        })
        .as_path()
}

/// Rewrite a shared-object search request (§4.5).
///
/// 1. Absolute names are never rewritten.
/// 2. Under the distribution's own loader, `libC.so.6` (capital C) maps to
///    the canonical `GLIBC_PREFIX/libc.so.6`.
/// 3. Under the distribution's own loader, otherwise probe `GLIBC_PREFIX/<name>`.
/// 4. Under any other loader, if the resolving executable is a system
///    command, probe the host's standard library directories.
/// 5. Otherwise, leave the name unchanged.
///
/// Takes `loader_is_distribution` explicitly (computed once in
/// `config::state()`) rather than reaching for the global state itself, so
/// the rewrite rule stays a pure, easily-tested function of its inputs.
pub fn rewrite(name: &str, loader_is_distribution: bool) -> AuditRewrite {
    if name.starts_with('/') {
        return AuditRewrite::Verbatim(name.to_string());
    }

    if loader_is_distribution {
        if name == "libC.so.6" {
            return AuditRewrite::Rewritten(format!("{}/libc.so.6", GLIBC_PREFIX));
        }

        let candidate = format!("{}/{}", GLIBC_PREFIX, name);
        if Path::new(&candidate).exists() {
            return AuditRewrite::Rewritten(candidate);
        }

        return AuditRewrite::Verbatim(name.to_string());
    }

    if pathutil::is_under_system_prefix(current_executable()) {
        const SYSTEM_LIB_DIRS: &[&str] = &["/usr/lib64", "/lib64", "/usr/lib", "/lib"];
        for dir in SYSTEM_LIB_DIRS {
            let candidate = format!("{}/{}", dir, name);
            if Path::new(&candidate).exists() {
                return AuditRewrite::Rewritten(candidate);
            }
        }
        return AuditRewrite::NotFound;
    }

    AuditRewrite::Verbatim(name.to_string())
}

/// §4.6's "is `basename` one of the distribution's own shared objects"
/// check, reused here so the audit module and the path hook adapter agree
/// on the same cached listing.
pub fn is_glibc_provided(basename: &str) -> bool {
    glibc_cache::contains(basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_names_pass_through() {
        assert_eq!(
            rewrite("/opt/foo.so", true),
            AuditRewrite::Verbatim("/opt/foo.so".to_string())
        );
        assert_eq!(
            rewrite("/opt/foo.so", false),
            AuditRewrite::Verbatim("/opt/foo.so".to_string())
        );
    }

    #[test]
    fn libc_capital_c_maps_to_canonical_libc() {
        assert_eq!(
            rewrite("libC.so.6", true),
            AuditRewrite::Rewritten(format!("{}/libc.so.6", GLIBC_PREFIX))
        );
    }

    #[test]
    fn non_distribution_loader_default_passthrough_when_not_system_exe() {
        // current_executable() resolves to the test binary's own path,
        // which is not under any SYSTEM_EXE_PREFIXES entry.
        assert_eq!(
            rewrite("libfoo.so.1", false),
            AuditRewrite::Verbatim("libfoo.so.1".to_string())
        );
    }
}
