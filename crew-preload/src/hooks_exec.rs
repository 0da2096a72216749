//! Exported `exec*`/`posix_spawn*` symbols (§4.9). The array-taking variants
//! (`execv`, `execve`, `execvp`, `execvpe`, `posix_spawn`, `posix_spawnp`)
//! forward straight into `exec::run`. The `l`-suffixed variants take a
//! genuine C variadic argument list, which stable Rust cannot declare as a
//! function definition; instead they're declared with a fixed run of
//! `*const c_char` slots. The System V ABI passes every vararg pointer
//! argument the same way regardless of its logical type, so reading a fixed
//! number of slots and stopping at the first NULL recovers exactly the
//! argv (and, for `execle`, the envp immediately following it) a true
//! variadic definition would have seen, as long as the real call used no
//! more than the 16 slots declared below — true of every realistic caller.

use libc::c_char;

use crate::exec::{self, SpawnTarget};

#[no_mangle]
pub unsafe extern "C" fn execv(path: *const c_char, argv: *const *const c_char) -> libc::c_int {
    exec::run(path, argv, libc::environ as *const *const c_char, false, None)
}

#[no_mangle]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> libc::c_int {
    exec::run(path, argv, envp, false, None)
}

#[no_mangle]
pub unsafe extern "C" fn execvp(file: *const c_char, argv: *const *const c_char) -> libc::c_int {
    exec::run(file, argv, libc::environ as *const *const c_char, true, None)
}

#[no_mangle]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> libc::c_int {
    exec::run(file, argv, envp, true, None)
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawn(
    pid_out: *mut libc::pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> libc::c_int {
    exec::run(
        path,
        argv,
        envp,
        false,
        Some(SpawnTarget {
            pid_out,
            file_actions,
            attrp,
        }),
    )
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawnp(
    pid_out: *mut libc::pid_t,
    file: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> libc::c_int {
    exec::run(
        file,
        argv,
        envp,
        true,
        Some(SpawnTarget {
            pid_out,
            file_actions,
            attrp,
        }),
    )
}

/// Scan the 16 captured vararg slots (which begin at `argv[0]`, per
/// `execl`'s convention of passing it as the first vararg) for the NULL
/// sentinel, and recover the envp array immediately following it when one
/// is present (`execle`'s extra trailing argument).
fn collect_varargs(slots: [*const c_char; 16]) -> (Vec<*const c_char>, Option<*const *const c_char>) {
    let mut argv = Vec::with_capacity(slots.len() + 1);
    let mut envp = None;
    for (i, &slot) in slots.iter().enumerate() {
        if slot.is_null() {
            if i + 1 < slots.len() {
                envp = Some(slots[i + 1] as *const *const c_char);
            }
            break;
        }
        argv.push(slot);
    }
    argv.push(std::ptr::null());
    (argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn execl(
    path: *const c_char,
    v0: *const c_char,
    v1: *const c_char,
    v2: *const c_char,
    v3: *const c_char,
    v4: *const c_char,
    v5: *const c_char,
    v6: *const c_char,
    v7: *const c_char,
    v8: *const c_char,
    v9: *const c_char,
    v10: *const c_char,
    v11: *const c_char,
    v12: *const c_char,
    v13: *const c_char,
    v14: *const c_char,
    v15: *const c_char,
) -> libc::c_int {
    let (argv, _) = collect_varargs([
        v0, v1, v2, v3, v4, v5, v6, v7, v8, v9, v10, v11, v12, v13, v14, v15,
    ]);
    exec::run(path, argv.as_ptr(), libc::environ as *const *const c_char, false, None)
}

#[no_mangle]
pub unsafe extern "C" fn execlp(
    path: *const c_char,
    v0: *const c_char,
    v1: *const c_char,
    v2: *const c_char,
    v3: *const c_char,
    v4: *const c_char,
    v5: *const c_char,
    v6: *const c_char,
    v7: *const c_char,
    v8: *const c_char,
    v9: *const c_char,
    v10: *const c_char,
    v11: *const c_char,
    v12: *const c_char,
    v13: *const c_char,
    v14: *const c_char,
    v15: *const c_char,
) -> libc::c_int {
    let (argv, _) = collect_varargs([
        v0, v1, v2, v3, v4, v5, v6, v7, v8, v9, v10, v11, v12, v13, v14, v15,
    ]);
    exec::run(path, argv.as_ptr(), libc::environ as *const *const c_char, true, None)
}

#[no_mangle]
pub unsafe extern "C" fn execle(
    path: *const c_char,
    v0: *const c_char,
    v1: *const c_char,
    v2: *const c_char,
    v3: *const c_char,
    v4: *const c_char,
    v5: *const c_char,
    v6: *const c_char,
    v7: *const c_char,
    v8: *const c_char,
    v9: *const c_char,
    v10: *const c_char,
    v11: *const c_char,
    v12: *const c_char,
    v13: *const c_char,
    v14: *const c_char,
    v15: *const c_char,
) -> libc::c_int {
    let (argv, envp) = collect_varargs([
        v0, v1, v2, v3, v4, v5, v6, v7, v8, v9, v10, v11, v12, v13, v14, v15,
    ]);
    let envp = envp.unwrap_or(libc::environ as *const *const c_char);
    exec::run(path, argv.as_ptr(), envp, false, None)
}
