//! Exported file-access symbols (§4.6): rewrite the path when compile hacks
//! are enabled and the library being looked up is one of the distribution's
//! own, then fall through to the real call either way.

use std::ffi::{CStr, CString};
use std::path::Path;

use libc::{c_char, c_int, c_uint, c_void, mode_t, FILE};

use crew_preload_common::{config, pathhook};

use crate::originals;

/// Rewrite `path` per `pathhook::maybe_rewrite` and hand back a `CString`
/// to keep alive for the duration of the real call, plus the pointer the
/// real call should actually use.
unsafe fn rewritten(path: *const c_char) -> CString {
    use std::os::unix::ffi::OsStrExt;

    let original = CStr::from_ptr(path);
    // A path with invalid UTF-8 can never match the `/usr/lib`-style
    // prefixes `maybe_rewrite` looks for; pass it through untouched rather
    // than risk losing bytes by round-tripping through `Path`/`str`.
    let as_str = match original.to_str() {
        Ok(s) => s,
        Err(_) => return original.to_owned(),
    };

    let state = config::state();
    let rewritten = pathhook::maybe_rewrite(Path::new(as_str), state.flags.compile_hacks);
    CString::new(rewritten.as_os_str().as_bytes()).unwrap_or_else(|_| original.to_owned())
}

#[no_mangle]
pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    let path = rewritten(path);
    (originals::access())(path.as_ptr(), mode)
}

#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let path = rewritten(path);
    (originals::stat())(path.as_ptr(), buf as *mut c_void)
}

#[no_mangle]
pub unsafe extern "C" fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let path = rewritten(path);
    (originals::lstat())(path.as_ptr(), buf as *mut c_void)
}

#[no_mangle]
pub unsafe extern "C" fn statx(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mask: c_uint,
    statxbuf: *mut c_void,
) -> c_int {
    let path = rewritten(path);
    (originals::statx())(dirfd, path.as_ptr(), flags, mask, statxbuf)
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let path = rewritten(path);
    (originals::open())(path.as_ptr(), flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let path = rewritten(path);
    (originals::open64())(path.as_ptr(), flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let path = rewritten(path);
    (originals::fopen())(path.as_ptr(), mode)
}

#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let path = rewritten(path);
    (originals::fopen64())(path.as_ptr(), mode)
}
