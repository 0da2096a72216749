use std::env;
use std::ffi::CStr;

use once_cell::sync::OnceCell;

use super::constants::{CREW_GLIBC_VERSION, LIBRARY_PATH_CARRIER_VAR, LD_LIBRARY_PATH_VAR};
use super::flags::Flags;
use crate::diag;
use crate::elf::ExecutableClass;

extern "C" {
    /// glibc extension, not part of the libc crate's bindings: returns the
    /// version of the libc actually loaded into this process.
    fn gnu_get_libc_version() -> *const libc::c_char;
}

/// Process-wide state `S` (§3), published exactly once.
#[derive(Debug)]
pub struct CoreState {
    pub flags: Flags,
    pub pid: libc::pid_t,
    pub kernel_machine: String,
    /// Bitness of the distribution's interpreter (`CREW_GLIBC_IS_64BIT`,
    /// reflected here as a value rather than a `const bool` so future
    /// multi-arch builds can compute it instead of hardcoding it).
    pub distro_interp_bitness: ExecutableClass,
    /// True when the dynamic linker that is resolving *this* process is
    /// itself the distribution's linker (§4.5 step 2/3).
    pub loader_is_distribution: bool,
}

static STATE: OnceCell<CoreState> = OnceCell::new();

/// Returns the process-wide state, performing the one-time setup described
/// in §4.1/§5 on the first call from any thread. `OnceCell::get_or_init` is
/// itself the "idempotent, exactly-once initializer published via release
/// semantics" required by §5: a losing racer simply discards its own
/// (otherwise identical) computation and reads the winner's.
pub fn state() -> &'static CoreState {
    STATE.get_or_init(|| {
        let flags = Flags::from_env();
        restore_library_path();

        let pid = unsafe { libc::getpid() };
        let kernel_machine = kernel_machine_string();
        let loader_is_distribution = detect_loader_is_distribution();

        if flags.verbose {
            diag::install();
        }

        CoreState {
            flags,
            pid,
            kernel_machine,
            distro_interp_bitness: if super::constants::CREW_GLIBC_IS_64BIT {
                ExecutableClass::Class64
            } else {
                ExecutableClass::Class32
            },
            loader_is_distribution,
        }
    })
}

/// §4.1 / §3 Invariant 5: restore `LD_LIBRARY_PATH` from the sibling
/// round-trip variable a parent process may have set, then clear the
/// sibling so it is not propagated further than one generation.
fn restore_library_path() {
    if let Ok(saved) = env::var(LIBRARY_PATH_CARRIER_VAR) {
        env::set_var(LD_LIBRARY_PATH_VAR, saved);
    }
    env::remove_var(LIBRARY_PATH_CARRIER_VAR);
}

fn kernel_machine_string() -> String {
    nix::sys::utsname::uname().machine().to_string()
}

/// Compare the libc actually resolving this process against the
/// compiled-in `CREW_GLIBC_VERSION` to decide whether the running loader is
/// the distribution's own (§4.5).
fn detect_loader_is_distribution() -> bool {
    let version = unsafe {
        let ptr = gnu_get_libc_version();
        if ptr.is_null() {
            return false;
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    };
    version == CREW_GLIBC_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_library_path_round_trips_and_clears_carrier() {
        env::set_var(LIBRARY_PATH_CARRIER_VAR, "/old/path");
        env::remove_var(LD_LIBRARY_PATH_VAR);
        restore_library_path();
        assert_eq!(env::var(LD_LIBRARY_PATH_VAR).unwrap(), "/old/path");
        assert!(env::var(LIBRARY_PATH_CARRIER_VAR).is_err());
        env::remove_var(LD_LIBRARY_PATH_VAR);
    }
}
