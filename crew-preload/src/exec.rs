//! Glue between the raw C calling convention and the exec transformer in
//! `crew-preload-common`: gather `(path, argv, envp)` into an `ExecRequest`,
//! run it through `transform::transform`, and dispatch the result to the
//! real `execve`/`posix_spawn`.

use std::ffi::CStr;
use std::os::unix::io::RawFd;

use libc::{c_char, c_int};
use log::debug;

use crew_preload_common::config;
use crew_preload_common::transform::{self, ExecRequest, TransformResult};
use crew_preload_common::vectors;

use crate::originals;

/// Build an `ExecRequest` from the raw pointers a C caller handed us, run it
/// through the transformer, and either hand it to the real `execve` (when
/// `spawn` is `None`) or the real `posix_spawn`/`posix_spawnp`.
///
/// # Safety
/// `path_or_name`, `argv` and `envp` must be valid as the corresponding
/// `execve`/`posix_spawn` arguments.
pub unsafe fn run(
    path_or_name: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
    do_path_search: bool,
    spawn: Option<SpawnTarget>,
) -> c_int {
    let state = config::state();

    let request = ExecRequest {
        path_or_name: CStr::from_ptr(path_or_name).to_owned(),
        argv: vectors::read_vector(argv),
        envp: vectors::read_vector(envp),
        do_path_search,
    };

    match transform::transform(request, state) {
        Ok(result) => dispatch(result, spawn),
        Err(error) => {
            debug!("exec transform failed: {}", error);
            match spawn {
                Some(_) => error.get_errno() as c_int,
                None => {
                    set_errno(error.get_errno() as c_int);
                    -1
                }
            }
        }
    }
}

/// The extra bits `posix_spawn`/`posix_spawnp` need on top of `execve`'s
/// `(path, argv, envp)`: the output pid slot and the two opaque attribute
/// structures, forwarded verbatim since this interceptor never interprets
/// them (§4.9).
pub struct SpawnTarget {
    pub pid_out: *mut libc::pid_t,
    pub file_actions: *const libc::posix_spawn_file_actions_t,
    pub attrp: *const libc::posix_spawnattr_t,
}

fn dispatch(result: TransformResult, spawn: Option<SpawnTarget>) -> c_int {
    let argv_raw = vectors::build_raw_vector(&result.argv);
    let envp_raw = vectors::build_raw_vector(&result.envp);

    let rc = match spawn {
        None => unsafe {
            (originals::execve())(result.path.as_ptr(), argv_raw.as_ptr(), envp_raw.as_ptr())
        },
        Some(target) => unsafe {
            (originals::posix_spawn())(
                target.pid_out,
                result.path.as_ptr(),
                target.file_actions as *const libc::c_void,
                target.attrp as *const libc::c_void,
                argv_raw.as_ptr(),
                envp_raw.as_ptr(),
            )
        },
    };

    // The real call only returns at all when it failed (execve) or could
    // not even launch the child (posix_spawn); either way the memfd, if
    // any, is no longer needed.
    if let Some(fd) = result.patched_fd {
        close_memfd(fd);
    }

    rc
}

fn close_memfd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

fn set_errno(errno: c_int) {
    unsafe {
        *libc::__errno_location() = errno;
    }
}
