//! `crew-audit.so`: the `LD_AUDIT` half (§4.5, §4.8). A dynamic-linker audit
//! library exports a fixed set of `la_*` C symbols that `ld.so` calls back
//! into at well-known points in the load sequence; this crate is the thin
//! adapter translating those callbacks into `crew-preload-common::audit`.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_uint};

use log::debug;

use crew_preload_common::audit::{self, AuditRewrite};
use crew_preload_common::config;

/// `ld.so`'s own interface version, returned from `la_version` to tell the
/// loader which callbacks this audit library understands. Taken from
/// `bits/link_lavcurrent.h`, which the `libc` crate doesn't bind.
const LAV_CURRENT: c_uint = 2;

/// First callback the loader makes into an audit library (`rtld-audit(7)`),
/// once per `LD_AUDIT` entry, before any other `la_*` hook. Its job here is
/// purely to trigger the same one-time state setup `crew-preload` performs
/// on its first interposed call, so `la_objsearch` always runs against an
/// initialized `config::state()`.
#[no_mangle]
pub extern "C" fn la_version(version: c_uint) -> c_uint {
    let state = config::state();
    debug!(
        "initialized for interface version {} (loader_is_distribution={})",
        version, state.loader_is_distribution
    );
    LAV_CURRENT
}

/// Called once, after the initial link-map is fully relocated but before
/// control passes to the program's entry point. There's nothing left to
/// rewrite by this point, so this is a diagnostic-only hook; its return
/// value is reserved by the audit ABI and ignored by `ld.so`.
#[no_mangle]
pub extern "C" fn la_preinit(_cookie: *mut usize) -> c_uint {
    debug!("preinit complete, pid {}", config::state().pid);
    0
}

/// Called for every shared-object name the loader is about to search for,
/// giving the audit library a chance to substitute a different path (§4.5).
///
/// # Safety
/// `soname` must be a valid, NUL-terminated C string for the duration of
/// the call, as guaranteed by `ld.so`'s audit interface contract.
#[no_mangle]
pub unsafe extern "C" fn la_objsearch(
    soname: *const c_char,
    _cookie: *mut usize,
    _flag: c_uint,
) -> *mut c_char {
    let state = config::state();
    let name = CStr::from_ptr(soname);

    let name_str = match name.to_str() {
        Ok(s) => s,
        // Not a name we can reason about; hand the loader back its own
        // pointer unchanged rather than risk a lossy round-trip.
        Err(_) => return soname as *mut c_char,
    };

    match audit::rewrite(name_str, state.loader_is_distribution) {
        AuditRewrite::Verbatim(_) => soname as *mut c_char,
        AuditRewrite::Rewritten(path) => {
            debug!("rewriting {} -> {}", name_str, path);
            // `ld.so` takes ownership of neither the input nor the output
            // pointer; it reads the returned string and moves on, so a
            // small intentional leak per rewrite is the correct lifetime
            // here (mirrors the `malloc`'d buffer in the original audit
            // library, which is never freed either).
            leak_cstring(path)
        }
        AuditRewrite::NotFound => {
            debug!("{} not found under any searched prefix", name_str);
            std::ptr::null_mut()
        }
    }
}

fn leak_cstring(path: String) -> *mut c_char {
    match CString::new(path) {
        Ok(owned) => owned.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
