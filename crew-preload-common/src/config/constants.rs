//! Compile-time constants. Each has a sensible default for local builds and
//! development, but a real deployment overrides every one of these via the
//! matching `CREW_PRELOAD_BUILD_*` environment variable at compile time
//! (`env!`/`option_env!`), the same way architecture-dependent addresses get
//! baked into a loader binary at build time.

/// The distribution's install root, e.g. `/usr/local`.
pub const PREFIX: &str = match option_env!("CREW_PRELOAD_BUILD_PREFIX") {
    Some(v) => v,
    None => "/usr/local",
};

/// Root directory holding the distribution's own copy of libc and friends.
pub const GLIBC_PREFIX: &str = match option_env!("CREW_PRELOAD_BUILD_GLIBC_PREFIX") {
    Some(v) => v,
    None => "/usr/local/opt/glibc",
};

/// The distribution's dynamic linker / interpreter.
pub const CREW_INTERPRETER: &str = match option_env!("CREW_PRELOAD_BUILD_CREW_INTERPRETER") {
    Some(v) => v,
    None => "/usr/local/opt/glibc/lib/ld-linux-x86-64.so.2",
};

/// The host OS's own dynamic linker / interpreter.
pub const SYSTEM_INTERPRETER: &str = match option_env!("CREW_PRELOAD_BUILD_SYSTEM_INTERPRETER") {
    Some(v) => v,
    None => "/lib64/ld-linux-x86-64.so.2",
};

/// Prefix used in verbose diagnostics: `[PID %i] <PROMPT_NAME>: ...`.
pub const PROMPT_NAME: &str = match option_env!("CREW_PRELOAD_BUILD_PROMPT_NAME") {
    Some(v) => v,
    None => "crew",
};

/// Whether the distribution's own libc/interpreter is 64-bit.
pub const CREW_GLIBC_IS_64BIT: bool = !matches!(
    option_env!("CREW_PRELOAD_BUILD_GLIBC_IS_64BIT"),
    Some("0")
);

/// The distribution's libc version string, compared against the version
/// reported by whatever loader is actually running this process, to decide
/// whether "the loader itself is the distribution's loader" (§4.5).
pub const CREW_GLIBC_VERSION: &str = match option_env!("CREW_PRELOAD_BUILD_GLIBC_VERSION") {
    Some(v) => v,
    None => "2.35",
};

/// Prefixes that mark a path as belonging to the host OS rather than the
/// distribution.
pub const SYSTEM_EXE_PREFIXES: &[&str] = &["/usr/bin/", "/usr/sbin/", "/bin/", "/sbin/"];

/// Basenames recognized as native or foreign linker drivers.
pub const LINKER_NAMES: &[&str] = &["ld", "ld.bfd", "ld.gold", "ld.lld", "ld.mold", "mold"];

/// System commands for which the distribution ships a preferred replacement.
pub const OVERRIDE_CMDS: &[&str] = &["/bin/bash", "/bin/sh", "/usr/bin/coreutils"];

/// Round-trip carrier for a stripped `LD_LIBRARY_PATH` (§4.7 step 6, §6).
pub const LIBRARY_PATH_CARRIER_VAR: &str = "CREW_PRELOAD_LIBRARY_PATH";

pub const LD_PRELOAD_VAR: &str = "LD_PRELOAD";
pub const LD_LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// The 64-bit and 32-bit installed copies of this preload module, used to
/// populate `LD_PRELOAD` for a child of the matching bitness (§3 Invariant 4).
pub const PRELOAD_SO_64: &str = match option_env!("CREW_PRELOAD_BUILD_PRELOAD_SO_64") {
    Some(v) => v,
    None => "/usr/local/lib64/crew-preload.so",
};
pub const PRELOAD_SO_32: &str = match option_env!("CREW_PRELOAD_BUILD_PRELOAD_SO_32") {
    Some(v) => v,
    None => "/usr/local/lib/crew-preload.so",
};

/// `PATH_MAX` as used throughout the transformer (§3 Invariant 2).
pub const PATH_MAX: usize = libc::PATH_MAX as usize;

/// Upper bound on argv/envp vector length (§3 Invariant 2).
pub const MAX_VECTOR_LEN: usize = 4096;
