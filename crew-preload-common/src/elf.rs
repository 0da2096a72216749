//! ELF inspector (C3): parse ELF32/64 headers out of an in-memory buffer,
//! locate `PT_INTERP`, and (for the exec transformer's step 9) rewrite the
//! interpreter string in place.
//!
//! Fields are read with `byteorder` rather than transmuting a `#[repr(C)]`
//! header over the raw bytes, since this code parses untrusted executables
//! of either bitness on any host and a misaligned/mistyped transmute would
//! be UB. Little-endian only, matching the `aarch64`/`x86_64` targets in
//! scope (§4.7 step 6).

use std::ffi::CString;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::{Error, Result, ENOEXEC};

const EI_NIDENT: usize = 16;
const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;

pub const PT_INTERP: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableClass {
    Class32,
    Class64,
}

impl ExecutableClass {
    pub fn is_64bit(self) -> bool {
        matches!(self, ExecutableClass::Class64)
    }

    /// Size in bytes of the ELF file header for this class.
    fn ehdr_size(self) -> usize {
        match self {
            ExecutableClass::Class32 => 52,
            ExecutableClass::Class64 => 64,
        }
    }

    /// Size in bytes of one program header entry for this class.
    fn phdr_size(self) -> usize {
        match self {
            ExecutableClass::Class32 => 32,
            ExecutableClass::Class64 => 56,
        }
    }
}

/// Everything the exec transformer needs to know about a candidate
/// executable (§4.3).
/// `e_machine` values this spec cares about (§4.7 step 6).
pub const EM_386: u16 = 3;
pub const EM_ARM: u16 = 40;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfInspection {
    pub is_elf: bool,
    pub is_64bit: bool,
    pub is_dynamic: bool,
    pub e_machine: u16,
    pub interpreter_string: Option<CString>,
    /// File offset of the `PT_INTERP` program header entry itself (not the
    /// string it points to); used by `patch_interpreter` to relocate it.
    pub interp_pheader_offset: Option<u64>,
}

impl ElfInspection {
    fn not_elf() -> Self {
        ElfInspection {
            is_elf: false,
            is_64bit: false,
            is_dynamic: false,
            e_machine: 0,
            interpreter_string: None,
            interp_pheader_offset: None,
        }
    }

    fn no_interp(is_64bit: bool, e_machine: u16) -> Self {
        ElfInspection {
            is_elf: true,
            is_64bit,
            is_dynamic: false,
            e_machine,
            interpreter_string: None,
            interp_pheader_offset: None,
        }
    }

    /// §4.7 step 6: supported combinations are 64-bit on `x86_64`/`aarch64`,
    /// or 32-bit on `x86`/`arm`.
    pub fn has_supported_bitness(&self) -> bool {
        if self.is_64bit {
            matches!(self.e_machine, EM_X86_64 | EM_AARCH64)
        } else {
            matches!(self.e_machine, EM_386 | EM_ARM)
        }
    }
}

/// Parse `bytes` as an ELF header and, if dynamic, locate `PT_INTERP`
/// (§4.3). Never errors: an unparseable or non-ELF buffer just yields
/// `is_elf = false`, and a program-header table extending past `bytes` is
/// treated as not-dynamic (contract #3).
pub fn inspect(bytes: &[u8]) -> ElfInspection {
    if bytes.len() < EI_NIDENT || &bytes[0..4] != ELF_MAGIC {
        return ElfInspection::not_elf();
    }

    let class = match bytes[4] {
        ELFCLASS32 => ExecutableClass::Class32,
        ELFCLASS64 => ExecutableClass::Class64,
        _ => return ElfInspection::not_elf(),
    };

    if bytes.len() < class.ehdr_size() {
        return ElfInspection::not_elf();
    }

    let e_machine = u16::from_le_bytes(bytes[18..20].try_into().unwrap());

    let (e_phoff, e_phnum) = match read_phdr_location(bytes, class) {
        Some(v) => v,
        None => return ElfInspection::not_elf(),
    };

    let phdr_size = class.phdr_size() as u64;
    for i in 0..e_phnum as u64 {
        let phdr_offset = e_phoff + i * phdr_size;
        let entry = match read_phdr(bytes, class, phdr_offset) {
            Some(entry) => entry,
            // Program-header table runs past the buffer: not-dynamic (contract #3).
            None => return ElfInspection::no_interp(class.is_64bit(), e_machine),
        };

        if entry.p_type != PT_INTERP {
            continue;
        }

        let interp = read_interp_string(bytes, entry.p_offset, entry.p_filesz);
        return ElfInspection {
            is_elf: true,
            is_64bit: class.is_64bit(),
            is_dynamic: interp.is_some(),
            e_machine,
            interpreter_string: interp,
            interp_pheader_offset: Some(phdr_offset),
        };
    }

    ElfInspection::no_interp(class.is_64bit(), e_machine)
}

struct ProgramHeader {
    p_type: u32,
    p_offset: u64,
    p_filesz: u64,
}

fn read_phdr_location(bytes: &[u8], class: ExecutableClass) -> Option<(u64, u16)> {
    let mut cur = Cursor::new(bytes);
    match class {
        ExecutableClass::Class32 => {
            cur.set_position(28);
            let e_phoff = cur.read_u32::<LittleEndian>().ok()? as u64;
            cur.set_position(44);
            let e_phnum = cur.read_u16::<LittleEndian>().ok()?;
            Some((e_phoff, e_phnum))
        }
        ExecutableClass::Class64 => {
            cur.set_position(32);
            let e_phoff = cur.read_u64::<LittleEndian>().ok()?;
            cur.set_position(56);
            let e_phnum = cur.read_u16::<LittleEndian>().ok()?;
            Some((e_phoff, e_phnum))
        }
    }
}

fn read_phdr(bytes: &[u8], class: ExecutableClass, offset: u64) -> Option<ProgramHeader> {
    let offset = offset as usize;
    if offset.checked_add(class.phdr_size())? > bytes.len() {
        return None;
    }
    let mut cur = Cursor::new(&bytes[offset..]);
    match class {
        ExecutableClass::Class32 => {
            let p_type = cur.read_u32::<LittleEndian>().ok()?;
            let p_offset = cur.read_u32::<LittleEndian>().ok()? as u64;
            Some(ProgramHeader {
                p_type,
                p_offset,
                p_filesz: {
                    cur.set_position(16);
                    cur.read_u32::<LittleEndian>().ok()? as u64
                },
            })
        }
        ExecutableClass::Class64 => {
            let p_type = cur.read_u32::<LittleEndian>().ok()?;
            let _p_flags = cur.read_u32::<LittleEndian>().ok()?;
            let p_offset = cur.read_u64::<LittleEndian>().ok()?;
            Some(ProgramHeader {
                p_type,
                p_offset,
                p_filesz: {
                    cur.set_position(32);
                    cur.read_u64::<LittleEndian>().ok()?
                },
            })
        }
    }
}

fn read_interp_string(bytes: &[u8], offset: u64, filesz: u64) -> Option<CString> {
    let start = offset as usize;
    let end = start.checked_add(filesz as usize)?;
    if end > bytes.len() || end == 0 {
        return None;
    }
    let mut raw = &bytes[start..end];
    if let Some(nul) = raw.iter().position(|&b| b == 0) {
        raw = &raw[..nul];
    }
    CString::new(raw).ok()
}

/// Layout of a `PT_INTERP` program header entry to be rewritten (§6,
/// "ELF patching bit-exactness"): all five fields must be updated together.
#[derive(Debug, Clone, Copy)]
pub struct InterpFieldOffsets {
    pub p_offset: usize,
    pub p_vaddr: usize,
    pub p_paddr: usize,
    pub p_filesz: usize,
    pub p_memsz: usize,
    pub width: usize,
}

impl InterpFieldOffsets {
    fn for_class(class: ExecutableClass) -> Self {
        match class {
            ExecutableClass::Class32 => InterpFieldOffsets {
                p_offset: 4,
                p_vaddr: 8,
                p_paddr: 12,
                p_filesz: 16,
                p_memsz: 20,
                width: 4,
            },
            ExecutableClass::Class64 => InterpFieldOffsets {
                p_offset: 8,
                p_vaddr: 16,
                p_paddr: 24,
                p_filesz: 32,
                p_memsz: 40,
                width: 8,
            },
        }
    }
}

fn e_shoff_offset(class: ExecutableClass) -> usize {
    match class {
        ExecutableClass::Class32 => 32,
        ExecutableClass::Class64 => 40,
    }
}

fn write_width(buf: &mut [u8], offset: usize, width: usize, value: u64) {
    match width {
        4 => buf[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes()),
        8 => buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes()),
        _ => unreachable!("ELF class widths are always 4 or 8"),
    }
}

fn read_width(buf: &[u8], offset: usize, width: usize) -> u64 {
    match width {
        4 => u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as u64,
        8 => u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap()),
        _ => unreachable!("ELF class widths are always 4 or 8"),
    }
}

/// Rewrite `bytes` so its `PT_INTERP` entry points at `new_interp`: insert
/// `new_interp\0` immediately before the section-header table, then fix up
/// `e_shoff` and all five `PT_INTERP` fields to describe the new location.
/// All bytes before and after the insertion region are preserved verbatim
/// (§6, §4.7 step 9).
pub fn patch_interpreter(
    bytes: &[u8],
    class: ExecutableClass,
    interp_pheader_offset: u64,
    new_interp: &CString,
) -> Result<Vec<u8>> {
    let (e_phoff, _) =
        read_phdr_location(bytes, class).ok_or_else(|| Error::errno(ENOEXEC))?;
    let _ = e_phoff; // only used for sanity in tests

    let sh_off_field = e_shoff_offset(class);
    let width = InterpFieldOffsets::for_class(class).width;
    let old_e_shoff = read_width(bytes, sh_off_field, width);

    let insert_point = old_e_shoff as usize;
    if insert_point > bytes.len() {
        return Err(Error::errno_with_msg(
            ENOEXEC,
            "e_shoff points past end of file, refusing to patch",
        ));
    }

    let interp_bytes = new_interp.as_bytes_with_nul();
    let new_e_shoff = old_e_shoff + interp_bytes.len() as u64;

    let mut out = Vec::with_capacity(bytes.len() + interp_bytes.len());
    out.extend_from_slice(&bytes[..insert_point]);
    out.extend_from_slice(interp_bytes);
    out.extend_from_slice(&bytes[insert_point..]);

    write_width(&mut out, sh_off_field, width, new_e_shoff);

    let fields = InterpFieldOffsets::for_class(class);
    let phdr_base = interp_pheader_offset as usize;
    let new_interp_offset = insert_point as u64;
    write_width(
        &mut out,
        phdr_base + fields.p_offset,
        fields.width,
        new_interp_offset,
    );
    write_width(
        &mut out,
        phdr_base + fields.p_vaddr,
        fields.width,
        new_interp_offset,
    );
    write_width(
        &mut out,
        phdr_base + fields.p_paddr,
        fields.width,
        new_interp_offset,
    );
    write_width(
        &mut out,
        phdr_base + fields.p_filesz,
        fields.width,
        interp_bytes.len() as u64,
    );
    write_width(
        &mut out,
        phdr_base + fields.p_memsz,
        fields.width,
        interp_bytes.len() as u64,
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal synthetic ELF64 buffer with one `PT_INTERP` header,
    /// so the inspector and patcher can be exercised without a real binary
    /// on disk.
    fn build_synthetic_elf64(interp: &str) -> Vec<u8> {
        let ehdr_size = 64usize;
        let phdr_size = 56usize;
        let interp_str_off = (ehdr_size + phdr_size) as u64;
        let interp_bytes = {
            let mut v = interp.as_bytes().to_vec();
            v.push(0);
            v
        };
        let shoff = interp_str_off + interp_bytes.len() as u64;

        let mut buf = vec![0u8; shoff as usize];
        buf[0..4].copy_from_slice(ELF_MAGIC);
        buf[4] = ELFCLASS64;
        buf[5] = 1; // little endian
        buf[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        // e_phoff = ehdr_size (one program header right after the header)
        buf[32..40].copy_from_slice(&(ehdr_size as u64).to_le_bytes());
        // e_shoff
        buf[40..48].copy_from_slice(&shoff.to_le_bytes());
        // e_phnum = 1
        buf[56..58].copy_from_slice(&1u16.to_le_bytes());

        let ph = ehdr_size;
        buf[ph..ph + 4].copy_from_slice(&PT_INTERP.to_le_bytes());
        // p_offset
        buf[ph + 8..ph + 16].copy_from_slice(&interp_str_off.to_le_bytes());
        // p_filesz
        buf[ph + 32..ph + 40].copy_from_slice(&(interp_bytes.len() as u64).to_le_bytes());

        buf.extend_from_slice(&interp_bytes);
        buf
    }

    #[test]
    fn not_elf_on_bad_magic() {
        let inspection = inspect(b"not an elf file at all");
        assert!(!inspection.is_elf);
    }

    #[test]
    fn finds_pt_interp_and_string() {
        let buf = build_synthetic_elf64("/lib64/ld-linux-x86-64.so.2");
        let inspection = inspect(&buf);
        assert!(inspection.is_elf);
        assert!(inspection.is_64bit);
        assert!(inspection.is_dynamic);
        assert_eq!(
            inspection.interpreter_string.unwrap().to_str().unwrap(),
            "/lib64/ld-linux-x86-64.so.2"
        );
        assert!(inspection.has_supported_bitness());
    }

    #[test]
    fn patch_round_trips_to_new_interpreter() {
        let buf = build_synthetic_elf64("/lib64/ld-linux-x86-64.so.2");
        let inspection = inspect(&buf);
        let phdr_off = inspection.interp_pheader_offset.unwrap();

        let new_interp = CString::new("/usr/local/opt/glibc/lib/ld-linux-x86-64.so.2").unwrap();
        let patched = patch_interpreter(&buf, ExecutableClass::Class64, phdr_off, &new_interp)
            .expect("patch should succeed");

        let reinspected = inspect(&patched);
        assert!(reinspected.is_dynamic);
        assert_eq!(reinspected.interpreter_string.unwrap(), new_interp);

        // bytes before the insertion point are untouched except e_shoff, and
        // the section-header-table bytes (there are none in this fixture)
        // are preserved.
        assert_eq!(&patched[..4], ELF_MAGIC);
    }

    #[test]
    fn phdr_table_past_buffer_is_not_dynamic() {
        let mut buf = build_synthetic_elf64("/lib64/ld-linux-x86-64.so.2");
        // Claim many more program headers than actually fit.
        buf[56..58].copy_from_slice(&200u16.to_le_bytes());
        let inspection = inspect(&buf);
        assert!(inspection.is_elf);
        assert!(!inspection.is_dynamic);
    }
}
