//! In-memory interpreter patch (§4.7 step 9): write a patched copy of the
//! executable into an anonymous memfd and hand back `/proc/self/fd/<fd>` as
//! the path to exec. The fd is deliberately **not** close-on-exec (§5: "An
//! anonymous in-memory file holding a patched executable is inherited
//! across exec by virtue of not being close-on-exec").

use std::ffi::{CStr, CString};
use std::os::unix::io::RawFd;

use crate::errors::Result;

/// Create an anonymous memfd containing `bytes`, seal nothing, and return
/// its fd. `None` means the kernel/platform could not provide one (no
/// `memfd_create`, out of memory, etc.) — callers degrade to the
/// `CREW_INTERPRETER`-as-wrapper fallback in that case (§4.7 step 9, §7).
pub fn create_memfd_with_contents(name: &CStr, bytes: &[u8]) -> Option<RawFd> {
    let fd = unsafe { libc::memfd_create(name.as_ptr(), 0) };
    if fd < 0 {
        return None;
    }

    let mut remaining = bytes;
    while !remaining.is_empty() {
        let n = unsafe {
            libc::write(
                fd,
                remaining.as_ptr() as *const libc::c_void,
                remaining.len(),
            )
        };
        if n <= 0 {
            unsafe { libc::close(fd) };
            return None;
        }
        remaining = &remaining[n as usize..];
    }

    Some(fd)
}

/// Path string pointing at an already-open memfd, suitable for `execve`.
pub fn memfd_exec_path(fd: RawFd) -> Result<CString> {
    Ok(CString::new(format!("/proc/self/fd/{}", fd))?)
}
