//! Argv/envp builder (C4): copy, extend and edit null-terminated string
//! vectors. Everything here operates on `Vec<CString>` already living in
//! this process's address space, so there is no tracee/self distinction to
//! track the way a ptrace-based exec interceptor needs — only one address
//! space to worry about.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

/// Read a raw, NUL-terminated, NULL-terminated-array of C strings (as
/// handed to `main`/`execve`) into an owned `Vec<CString>`.
///
/// # Safety
/// `ptr` must point to a valid NULL-terminated array of valid C strings.
pub unsafe fn read_vector(ptr: *const *const c_char) -> Vec<CString> {
    let mut out = Vec::new();
    if ptr.is_null() {
        return out;
    }
    let mut i = 0isize;
    loop {
        let entry = *ptr.offset(i);
        if entry.is_null() {
            break;
        }
        out.push(CStr::from_ptr(entry).to_owned());
        i += 1;
    }
    out
}

/// Build a raw NULL-terminated array of `*const c_char` from owned
/// `CString`s. The returned `Vec` (and the `CString`s it was built from)
/// must outlive any use of the raw pointers it contains; callers pass the
/// `CString` vector alongside and drop both together after the real
/// primitive has been invoked (§3 Invariant 3).
pub fn build_raw_vector(entries: &[CString]) -> Vec<*const c_char> {
    let mut raw: Vec<*const c_char> = entries.iter().map(|c| c.as_ptr()).collect();
    raw.push(ptr::null());
    raw
}

/// Remove the first entry of `envp` whose bytes begin with `name` followed
/// by `=`, compacting in place (§4.4).
pub fn unset_var(envp: &mut Vec<CString>, name: &str) {
    let prefix = format!("{}=", name);
    if let Some(index) = envp
        .iter()
        .position(|entry| entry.to_bytes().starts_with(prefix.as_bytes()))
    {
        envp.remove(index);
    }
}

/// Set `name=value` in `envp`, replacing any existing entry for `name`.
pub fn set_var(envp: &mut Vec<CString>, name: &str, value: &str) {
    unset_var(envp, name);
    if let Ok(entry) = CString::new(format!("{}={}", name, value)) {
        envp.push(entry);
    }
}

/// Get the value of `name` in `envp`, if present.
pub fn get_var<'a>(envp: &'a [CString], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    envp.iter().find_map(|entry| {
        let s = entry.to_str().ok()?;
        s.strip_prefix(&prefix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cvec(strs: &[&str]) -> Vec<CString> {
        strs.iter().map(|s| CString::new(*s).unwrap()).collect()
    }

    #[test]
    fn unset_var_removes_first_match_only() {
        let mut env = cvec(&["PATH=/bin", "LD_LIBRARY_PATH=/x", "FOO=bar"]);
        unset_var(&mut env, "LD_LIBRARY_PATH");
        assert_eq!(env.len(), 2);
        assert!(get_var(&env, "LD_LIBRARY_PATH").is_none());
    }

    #[test]
    fn unset_var_does_not_match_prefix_without_equals() {
        let mut env = cvec(&["LD_LIBRARY_PATHOLOGICAL=yes"]);
        unset_var(&mut env, "LD_LIBRARY_PATH");
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn set_var_replaces_existing() {
        let mut env = cvec(&["FOO=old"]);
        set_var(&mut env, "FOO", "new");
        assert_eq!(env.len(), 1);
        assert_eq!(get_var(&env, "FOO"), Some("new"));
    }

    #[test]
    fn build_raw_vector_is_null_terminated() {
        let env = cvec(&["A=1", "B=2"]);
        let raw = build_raw_vector(&env);
        assert_eq!(raw.len(), 3);
        assert!(raw[2].is_null());
    }
}
