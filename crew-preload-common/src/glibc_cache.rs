//! Cached listing of regular files directly under `GLIBC_PREFIX`, shared by
//! the audit rewriter (C5) and the path hook adapter (C6), per §3 ("For the
//! audit module only: cached list of regular files under `GLIBC_PREFIX`")
//! and §4.6 (which needs the same listing from the preload side).

use std::collections::HashSet;
use std::fs;

use once_cell::sync::OnceCell;

use crate::config::constants::GLIBC_PREFIX;

static CACHE: OnceCell<HashSet<String>> = OnceCell::new();

fn build_cache() -> HashSet<String> {
    let mut names = HashSet::new();
    if let Ok(entries) = fs::read_dir(GLIBC_PREFIX) {
        for entry in entries.flatten() {
            if let Ok(file_type) = entry.file_type() {
                if file_type.is_file() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.insert(name.to_string());
                    }
                }
            }
        }
    }
    names
}

/// True iff `basename` names a regular file directly under `GLIBC_PREFIX`.
pub fn contains(basename: &str) -> bool {
    CACHE.get_or_init(build_cache).contains(basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_cache_tolerates_missing_prefix() {
        // GLIBC_PREFIX almost certainly doesn't exist in the test sandbox;
        // building the cache should come back empty rather than panicking.
        let cache = build_cache();
        if std::path::Path::new(GLIBC_PREFIX).is_dir() {
            return;
        }
        assert!(cache.is_empty());
    }
}
