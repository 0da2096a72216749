//! Resolution of the real libc entry points via `dlsym(RTLD_NEXT, ...)`,
//! cached after the first lookup the same way the original C wrapper
//! resolved `orig_execve`/`orig_posix_spawn` once in `preload_init()`.

use std::ffi::c_void;

use libc::c_char;
use once_cell::sync::OnceCell;

/// Look up `name` in whatever shared object would have resolved it had this
/// library not been `LD_PRELOAD`ed, and reinterpret it as `T`. `T` must be
/// the exact C function-pointer type of the symbol being resolved.
///
/// # Safety
/// `name` must name a real libc symbol whose ABI matches `T`.
unsafe fn dlsym_next<T: Copy>(name: &'static [u8]) -> T {
    let addr = libc::dlsym(libc::RTLD_NEXT, name.as_ptr() as *const c_char);
    assert!(
        !addr.is_null(),
        "dlsym(RTLD_NEXT, ...) could not resolve a symbol crew-preload depends on"
    );
    std::mem::transmute_copy::<*mut c_void, T>(&addr)
}

macro_rules! original_fn {
    ($getter:ident, $symbol:literal, $ty:ty) => {
        pub fn $getter() -> $ty {
            static CELL: OnceCell<$ty> = OnceCell::new();
            *CELL.get_or_init(|| unsafe { dlsym_next(concat!($symbol, "\0").as_bytes()) })
        }
    };
}

pub type ExecveFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> libc::c_int;

pub type PosixSpawnFn = unsafe extern "C" fn(
    *mut libc::pid_t,
    *const c_char,
    *const libc::c_void,
    *const libc::c_void,
    *const *const c_char,
    *const *const c_char,
) -> libc::c_int;

pub type AccessFn = unsafe extern "C" fn(*const c_char, libc::c_int) -> libc::c_int;
pub type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::c_void) -> libc::c_int;
pub type StatxFn = unsafe extern "C" fn(
    libc::c_int,
    *const c_char,
    libc::c_int,
    libc::c_uint,
    *mut libc::c_void,
) -> libc::c_int;
pub type OpenFn = unsafe extern "C" fn(*const c_char, libc::c_int, libc::mode_t) -> libc::c_int;
pub type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut libc::FILE;

original_fn!(execve, "execve", ExecveFn);
original_fn!(posix_spawn, "posix_spawn", PosixSpawnFn);
original_fn!(access, "access", AccessFn);
original_fn!(stat, "stat", StatFn);
original_fn!(lstat, "lstat", StatFn);
original_fn!(statx, "statx", StatxFn);
original_fn!(open, "open", OpenFn);
original_fn!(open64, "open64", OpenFn);
original_fn!(fopen, "fopen", FopenFn);
original_fn!(fopen64, "fopen64", FopenFn);
