//! Exec transformer (C7) — the core. Turns an `(executable, argv, envp,
//! flags)` request into the final `(executable', argv', envp')` handed to
//! the real `execve`/`posix_spawn`, per §4.7.
//!
//! The shebang-restart loop mirrors the kernel's own `binfmt_script` +
//! `search_binary_handler` dance: try to make progress, and if the step
//! asks for a restart with new parameters, loop, bounded by a rewrite
//! limit so a cyclic shebang chain can't spin forever.

mod linker;
mod memfd;
mod shebang;

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::Read;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::constants::{
    CREW_INTERPRETER, LD_LIBRARY_PATH_VAR, LD_PRELOAD_VAR, LIBRARY_PATH_CARRIER_VAR,
    OVERRIDE_CMDS, PREFIX, PRELOAD_SO_32, PRELOAD_SO_64,
};
use crate::config::CoreState;
use crate::elf::{self, ExecutableClass};
use crate::errors::{Error, Result, EACCES, EINVAL, EISDIR, ELOOP, ENOENT, ENOEXEC};
use crate::pathutil::{self, basename, PathSearch};
use crate::vectors;

/// Bound on shebang-interpreter restarts (the Linux kernel's own limit, 4).
const INTERPRETER_REWRITE_LIMIT: usize = 4;

/// A request to exec/spawn, gathered at the C8 boundary from whichever of
/// the six classic variants was called (§4.9).
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub path_or_name: CString,
    pub argv: Vec<CString>,
    pub envp: Vec<CString>,
    pub do_path_search: bool,
}

/// The final call to make against the real primitive (§4.7 step 10). If
/// `patched_fd` is `Some`, it must stay open (not be closed) until the real
/// `execve`/`posix_spawn` call has actually happened, since `path` names it
/// via `/proc/self/fd/<fd>`; close it if the delegated call itself fails.
#[derive(Debug)]
pub struct TransformResult {
    pub path: CString,
    pub argv: Vec<CString>,
    pub envp: Vec<CString>,
    pub patched_fd: Option<RawFd>,
}

/// §4.7: the public contract every exec/spawn variant funnels into.
pub fn transform(initial: ExecRequest, state: &CoreState) -> Result<TransformResult> {
    let mut request = initial;
    let mut previous_final_path: Option<PathBuf> = None;

    for _ in 0..=INTERPRETER_REWRITE_LIMIT {
        match transform_once(request, state)? {
            Outcome::Finished(result) => return Ok(result),
            Outcome::Restart {
                next_request,
                new_interpreter,
            } => {
                if previous_final_path.as_deref() == Some(new_interpreter.as_path()) {
                    return Err(Error::errno_with_msg(
                        ELOOP,
                        "shebang interpreter chain did not make progress",
                    ));
                }
                previous_final_path = Some(new_interpreter);
                request = next_request;
            }
        }
    }

    Err(Error::errno_with_msg(
        ELOOP,
        "exceeded the shebang interpreter rewrite limit",
    ))
}

enum Outcome {
    Finished(TransformResult),
    Restart {
        next_request: ExecRequest,
        new_interpreter: PathBuf,
    },
}

fn transform_once(request: ExecRequest, state: &CoreState) -> Result<Outcome> {
    // Step 1: resolve to an absolute path.
    let raw_name = request
        .path_or_name
        .to_str()
        .map_err(|_| Error::errno_with_msg(EINVAL, "path is not valid UTF-8"))?;
    let mut resolved = resolve_path(raw_name, request.do_path_search)?;

    // Step 2: stat check, deferred until we know the file exists (a missing
    // file isn't an immediate error here: steps 3/4 may still produce a
    // valid path, e.g. a system command the distribution ships a
    // replacement for).
    let mut exists = resolved.exists();
    if exists {
        if resolved.is_dir() {
            return Err(Error::errno(EISDIR));
        }
        if !pathutil::is_executable(&resolved)? {
            return Err(Error::errno(EACCES));
        }
    }

    // Step 3: command override. Applied to whatever path is about to be
    // resolved at every level of shebang recursion (see SPEC_FULL.md §9 /
    // DESIGN.md for why "before shebang parsing" was chosen over "during").
    if !state.flags.no_crew_cmd {
        if let Some(resolved_str) = resolved.to_str() {
            if OVERRIDE_CMDS.contains(&resolved_str) {
                let candidate = PathBuf::from(format!("{}{}", PREFIX, resolved_str));
                if pathutil::is_executable(&candidate).unwrap_or(false) {
                    resolved = candidate;
                    exists = true;
                }
            }
        }
    }

    // Step 4: system-command fallback.
    if !exists && pathutil::is_under_system_prefix(&resolved) {
        let candidate = PathBuf::from(format!("{}/bin/{}", PREFIX, basename(&resolved)));
        if pathutil::is_executable(&candidate).unwrap_or(false) {
            resolved = candidate;
            exists = true;
        } else {
            return Err(Error::errno(ENOENT));
        }
    }

    if !exists {
        return Err(Error::errno(ENOENT));
    }

    // Step 5: open and read the executable, parse its ELF record.
    let mut file = File::open(&resolved)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    if bytes.starts_with(b"#!") {
        // Step 7, taken early: this is a script, not an ELF binary.
        return handle_shebang(&resolved, &bytes, request);
    }

    let inspection = elf::inspect(&bytes);

    let mut argv = request.argv;
    let mut envp = request.envp;

    // Step 6: library-preload environment hygiene.
    apply_library_hygiene(&resolved, &inspection, &mut envp);

    if inspection.is_elf && !inspection.has_supported_bitness() {
        return Err(Error::errno(ENOEXEC));
    }

    // Step 8: linker substitution.
    let mut final_path = resolved.clone();
    if state.flags.compile_hacks {
        let substitution = linker::substitute_if_linker(&resolved, state.flags.no_mold);
        if let Some(new_path) = substitution.new_path {
            final_path = new_path;
        }
        if linker::is_linker(basename(&resolved)) {
            linker::append_dynamic_linker_flag(&mut argv);
        }
    }

    // Step 9: interpreter patch.
    if !state.flags.no_crew_glibc
        && inspection.is_dynamic
        && inspection.is_64bit == state.distro_interp_bitness.is_64bit()
    {
        if let Some(ref interp) = inspection.interpreter_string {
            if interp.to_str() != Ok(CREW_INTERPRETER) {
                return Ok(Outcome::Finished(patch_and_finish(
                    &final_path,
                    &bytes,
                    &inspection,
                    argv,
                    envp,
                )?));
            }
        }
    }

    Ok(Outcome::Finished(TransformResult {
        path: path_to_cstring(&final_path)?,
        argv,
        envp,
        patched_fd: None,
    }))
}

/// Step 1.
fn resolve_path(raw_name: &str, do_path_search: bool) -> Result<PathBuf> {
    let looks_like_a_path = raw_name.starts_with('/')
        || raw_name.starts_with("./")
        || raw_name.starts_with("../")
        || Path::new(raw_name).exists();

    if !do_path_search || looks_like_a_path {
        return Ok(PathBuf::from(raw_name));
    }

    match pathutil::search_in_path(raw_name) {
        PathSearch::Found(path) => Ok(path),
        PathSearch::PermissionDenied => Err(Error::errno(EACCES)),
        PathSearch::NotFound => Err(Error::errno(ENOENT)),
    }
}

/// Step 6.
fn apply_library_hygiene(
    resolved: &Path,
    inspection: &elf::ElfInspection,
    envp: &mut Vec<CString>,
) {
    vectors::unset_var(envp, LD_PRELOAD_VAR);
    let preload_so = if inspection.is_64bit {
        PRELOAD_SO_64
    } else {
        PRELOAD_SO_32
    };
    vectors::set_var(envp, LD_PRELOAD_VAR, preload_so);

    if basename(resolved) == "libc.so.6" {
        vectors::unset_var(envp, LD_PRELOAD_VAR);
        vectors::unset_var(envp, LD_LIBRARY_PATH_VAR);
        return;
    }

    if pathutil::is_under_system_prefix(resolved) && inspection.is_dynamic {
        if let Some(old_value) = vectors::get_var(envp, LD_LIBRARY_PATH_VAR).map(str::to_string) {
            vectors::unset_var(envp, LD_LIBRARY_PATH_VAR);
            vectors::set_var(envp, LIBRARY_PATH_CARRIER_VAR, &old_value);
        }
    }
}

/// Step 7: a script was found. Recompose argv and re-enter the transformer
/// with the interpreter as the new target (§4.7 step 7).
fn handle_shebang(script_path: &Path, bytes: &[u8], request: ExecRequest) -> Result<Outcome> {
    let parsed = shebang::parse_bytes(bytes)?;

    let mut new_argv = Vec::with_capacity(request.argv.len() + 3);
    new_argv.push(path_to_cstring(&parsed.interpreter)?);
    if let Some(arg) = parsed.optional_arg {
        new_argv.push(arg);
    }
    new_argv.push(path_to_cstring(script_path)?);
    new_argv.extend(request.argv.into_iter().skip(1));

    let next_request = ExecRequest {
        path_or_name: path_to_cstring(&parsed.interpreter)?,
        argv: new_argv,
        envp: request.envp,
        do_path_search: false,
    };

    Ok(Outcome::Restart {
        new_interpreter: parsed.interpreter,
        next_request,
    })
}

fn patch_and_finish(
    final_path: &Path,
    bytes: &[u8],
    inspection: &elf::ElfInspection,
    argv: Vec<CString>,
    envp: Vec<CString>,
) -> Result<TransformResult> {
    let class = if inspection.is_64bit {
        ExecutableClass::Class64
    } else {
        ExecutableClass::Class32
    };
    let phdr_offset = inspection
        .interp_pheader_offset
        .expect("is_dynamic implies interp_pheader_offset is set");
    let new_interp = CString::new(CREW_INTERPRETER).unwrap();

    let patch_result = elf::patch_interpreter(bytes, class, phdr_offset, &new_interp)
        .ok()
        .and_then(|patched| {
            let memfd_name = CString::new("crew-preload-patched").ok()?;
            memfd::create_memfd_with_contents(&memfd_name, &patched)
        });

    match patch_result {
        Some(fd) => {
            debug!("patched interpreter of {:?} via memfd", final_path);
            Ok(TransformResult {
                path: memfd::memfd_exec_path(fd)?,
                argv,
                envp,
                patched_fd: Some(fd),
            })
        }
        None => {
            debug!(
                "could not create memfd, falling back to running {:?} under {}",
                final_path, CREW_INTERPRETER
            );
            let mut wrapped_argv = Vec::with_capacity(argv.len() + 2);
            wrapped_argv.push(CString::new(CREW_INTERPRETER).unwrap());
            wrapped_argv.push(path_to_cstring(final_path)?);
            wrapped_argv.extend(argv.into_iter().skip(1));
            Ok(TransformResult {
                path: CString::new(CREW_INTERPRETER).unwrap(),
                argv: wrapped_argv,
                envp,
                patched_fd: None,
            })
        }
    }
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::errno_with_msg(EINVAL, "path contains an embedded NUL"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flags;

    fn test_state(overrides: Flags) -> CoreState {
        CoreState {
            flags: overrides,
            pid: 1,
            kernel_machine: "x86_64".to_string(),
            distro_interp_bitness: ExecutableClass::Class64,
            loader_is_distribution: false,
        }
    }

    #[test]
    fn resolve_path_treats_absolute_as_path() {
        let resolved = resolve_path("/bin/true", true).unwrap();
        assert_eq!(resolved, PathBuf::from("/bin/true"));
    }

    #[test]
    fn library_hygiene_drops_ld_library_path_for_libc() {
        let mut envp = vec![
            CString::new("LD_LIBRARY_PATH=/x").unwrap(),
            CString::new("LD_PRELOAD=/y").unwrap(),
        ];
        let inspection = elf::ElfInspection {
            is_elf: true,
            is_64bit: true,
            is_dynamic: true,
            e_machine: elf::EM_X86_64,
            interpreter_string: None,
            interp_pheader_offset: None,
        };
        apply_library_hygiene(Path::new("/usr/local/lib64/libc.so.6"), &inspection, &mut envp);
        assert!(vectors::get_var(&envp, "LD_LIBRARY_PATH").is_none());
        assert!(vectors::get_var(&envp, "LD_PRELOAD").is_none());
    }

    #[test]
    fn library_hygiene_picks_preload_so_from_target_bitness_not_distro() {
        let mut envp = Vec::new();
        let inspection = elf::ElfInspection {
            is_elf: true,
            is_64bit: false,
            is_dynamic: true,
            e_machine: elf::EM_386,
            interpreter_string: None,
            interp_pheader_offset: None,
        };
        apply_library_hygiene(Path::new("/opt/app/32bit-tool"), &inspection, &mut envp);
        assert_eq!(vectors::get_var(&envp, "LD_PRELOAD"), Some(PRELOAD_SO_32));
    }

    #[test]
    fn library_hygiene_carries_forward_system_command_library_path() {
        let mut envp = vec![CString::new("LD_LIBRARY_PATH=/y").unwrap()];
        let inspection = elf::ElfInspection {
            is_elf: true,
            is_64bit: true,
            is_dynamic: true,
            e_machine: elf::EM_X86_64,
            interpreter_string: None,
            interp_pheader_offset: None,
        };
        apply_library_hygiene(Path::new("/usr/bin/ls"), &inspection, &mut envp);
        assert!(vectors::get_var(&envp, "LD_LIBRARY_PATH").is_none());
        assert_eq!(
            vectors::get_var(&envp, LIBRARY_PATH_CARRIER_VAR),
            Some("/y")
        );
        assert_eq!(vectors::get_var(&envp, "LD_PRELOAD"), Some(PRELOAD_SO_64));
    }

    // The fixtures below drive `transform()` itself end to end against real
    // files in a scratch directory, since steps 1/2/5/7/9 all turn on
    // `File::open`/stat-ing the resolved path.
    mod end_to_end {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::atomic::{AtomicU32, Ordering};

        static COUNTER: AtomicU32 = AtomicU32::new(0);

        fn scratch_dir() -> PathBuf {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "crew-preload-transform-test-{}-{}",
                std::process::id(),
                n
            ));
            std::fs::create_dir_all(&dir).expect("create scratch dir");
            dir
        }

        fn write_executable(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, contents).expect("write fixture file");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod fixture file");
            path
        }

        #[test]
        fn two_level_shebang_chain_recomposes_argv() {
            let dir = scratch_dir();
            let final_bin = write_executable(&dir, "final", b"not an elf, just a plain binary");
            let script_b = write_executable(
                &dir,
                "script_b",
                format!("#!{} arg\n", final_bin.display()).as_bytes(),
            );
            let script_a = write_executable(
                &dir,
                "script_a",
                format!("#!{}\n", script_b.display()).as_bytes(),
            );

            let request = ExecRequest {
                path_or_name: path_to_cstring(&script_a).unwrap(),
                argv: vec![
                    path_to_cstring(&script_a).unwrap(),
                    CString::new("extra").unwrap(),
                ],
                envp: vec![],
                do_path_search: false,
            };
            let state = test_state(Flags::default());

            let result = transform(request, &state).expect("transform should finish");

            assert_eq!(result.path, path_to_cstring(&final_bin).unwrap());
            assert_eq!(
                result.argv,
                vec![
                    path_to_cstring(&final_bin).unwrap(),
                    CString::new("arg").unwrap(),
                    path_to_cstring(&script_b).unwrap(),
                    path_to_cstring(&script_a).unwrap(),
                    CString::new("extra").unwrap(),
                ]
            );

            std::fs::remove_dir_all(&dir).ok();
        }

        #[test]
        fn self_referential_shebang_is_rejected_as_a_cycle() {
            let dir = scratch_dir();
            // Written with a placeholder first, then rewritten once the real
            // path is known, since the script needs to name itself.
            let script_path = dir.join("self_loop");
            std::fs::write(&script_path, b"#!placeholder\n").expect("write fixture file");
            std::fs::write(&script_path, format!("#!{}\n", script_path.display()).as_bytes())
                .expect("rewrite fixture file with its own path");
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod fixture file");

            let request = ExecRequest {
                path_or_name: path_to_cstring(&script_path).unwrap(),
                argv: vec![path_to_cstring(&script_path).unwrap()],
                envp: vec![],
                do_path_search: false,
            };
            let state = test_state(Flags::default());

            let error = transform(request, &state).expect_err("a self-shebang must not loop forever");
            assert_eq!(error.get_errno(), ELOOP);

            std::fs::remove_dir_all(&dir).ok();
        }
    }
}
