//! Shebang parsing for the exec transformer's step 7. Reads up to the first
//! newline or `PATH_MAX` bytes, whichever comes first, the way
//! `binfmt_script.c` bounds its own prefix read.

use std::ffi::CString;
use std::path::PathBuf;

use crate::config::constants::PATH_MAX;
use crate::errors::{Error, Result, ENOEXEC};

#[derive(Debug, PartialEq, Eq)]
pub struct Shebang {
    pub interpreter: PathBuf,
    pub optional_arg: Option<CString>,
}

/// If the start of `file_bytes` is a `#!` line, parse the interpreter path
/// and optional single argument out of it (up to `PATH_MAX` bytes or the
/// first newline, per §4.7 step 7). Returns `Err(ENOEXEC)` for anything that
/// isn't a shebang line, so callers can fall through to ELF parsing.
pub fn parse_bytes(file_bytes: &[u8]) -> Result<Shebang> {
    let limit = file_bytes.len().min(PATH_MAX);
    let buffer = &file_bytes[..limit];

    if buffer.len() < 2 || &buffer[0..2] != b"#!" {
        return Err(Error::errno_with_msg(ENOEXEC, "file does not start with a shebang"));
    }

    let line_end = buffer.iter().position(|&c| c == b'\n').unwrap_or(buffer.len());

    let interp_start = buffer[2..line_end]
        .iter()
        .position(|&c| c != b' ' && c != b'\t')
        .map(|p| 2 + p)
        .ok_or_else(|| Error::errno_with_msg(ENOEXEC, "shebang line has no interpreter"))?;

    let interp_end = buffer[interp_start..line_end]
        .iter()
        .position(|&c| c == b' ' || c == b'\t' || c == b'\0')
        .map(|p| interp_start + p)
        .unwrap_or(line_end);

    if interp_start == interp_end {
        return Err(Error::errno_with_msg(ENOEXEC, "shebang interpreter path is empty"));
    }

    let interpreter = PathBuf::from(
        std::str::from_utf8(&buffer[interp_start..interp_end])
            .map_err(|_| Error::errno_with_msg(ENOEXEC, "shebang interpreter path is not UTF-8"))?,
    );

    let arg_start = buffer[interp_end..line_end]
        .iter()
        .position(|&c| c != b' ' && c != b'\t')
        .map(|p| interp_end + p)
        .unwrap_or(line_end);

    let optional_arg = if arg_start == line_end {
        None
    } else {
        let trimmed_end = buffer[arg_start..line_end]
            .iter()
            .rposition(|&c| c != b' ' && c != b'\t')
            .map(|p| arg_start + p + 1)
            .unwrap_or(arg_start);

        let arg_end = buffer[arg_start..trimmed_end]
            .iter()
            .position(|&c| c == b'\0')
            .map(|p| arg_start + p)
            .unwrap_or(trimmed_end);

        if arg_end > arg_start {
            Some(
                CString::new(&buffer[arg_start..arg_end])
                    .map_err(|_| Error::errno_with_msg(ENOEXEC, "shebang argument has an embedded NUL"))?,
            )
        } else {
            None
        }
    };

    Ok(Shebang {
        interpreter,
        optional_arg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interpreter_and_no_arg() {
        let shebang = parse_bytes(b"#!/bin/bash\necho hi\n").unwrap();
        assert_eq!(shebang.interpreter, PathBuf::from("/bin/bash"));
        assert_eq!(shebang.optional_arg, None);
    }

    #[test]
    fn parses_interpreter_with_single_optional_arg() {
        let shebang = parse_bytes(b"#!/usr/bin/env python3\nprint(1)\n").unwrap();
        assert_eq!(shebang.interpreter, PathBuf::from("/usr/bin/env"));
        assert_eq!(
            shebang.optional_arg,
            Some(CString::new("python3").unwrap())
        );
    }

    #[test]
    fn rejects_non_shebang_file() {
        assert_eq!(
            parse_bytes(b"\x7fELFnotreallybutwhatever").unwrap_err(),
            Error::errno(ENOEXEC)
        );
    }

    #[test]
    fn trims_trailing_whitespace_from_optional_arg() {
        let shebang = parse_bytes(b"#!/usr/bin/perl   -w   \nuse strict;\n").unwrap();
        assert_eq!(
            shebang.optional_arg,
            Some(CString::new("-w").unwrap())
        );
    }
}
