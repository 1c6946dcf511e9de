//! A from-scratch ELF64 writer for Wave's compiled output.
//!
//! There is exactly one segment: a single `PT_LOAD` mapping the whole
//! file (headers included) read-write-executable at a fixed load
//! address. Wave never links against anything, so there is no section
//! table, no dynamic segment and no relocation processing to speak of —
//! this writer's whole job is laying out 120 bytes of header ahead of
//! the code and data the compiler already produced.

use std::io::{self, Write};

/// Fixed load address every Wave executable is linked at.
pub const BASE_ADDR: u64 = 0x400000;
/// `BASE_ADDR` plus this is the entry point: 64-byte ELF header + 56-byte
/// program header.
pub const HEADER_SIZE: u64 = 120;
/// Globals live at this fixed absolute address regardless of how large
/// the program's actual global footprint turns out to be.
pub const GLOBALS_BASE: u64 = 0x600000;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

/// Write a minimally valid, statically linked ELF64 executable.
///
/// `global_bytes` is the number of bytes the compiler's global region
/// actually used; the mapped segment is extended to cover at least that
/// much past `GLOBALS_BASE`; a program with no globals still gets a
/// reserved page.
pub fn write_elf<W: Write>(code: &[u8], data: &[u8], global_bytes: u64, out: &mut W) -> io::Result<()> {
    let entry = BASE_ADDR + HEADER_SIZE;
    let total_size = (code.len() + data.len()) as u64;
    let file_size = HEADER_SIZE + total_size;
    let global_size = if global_bytes > 0 { global_bytes } else { 0x1000 };
    let mem_size = (GLOBALS_BASE - BASE_ADDR) + global_size + 0x10000;

    let mut ehdr = [0u8; EHDR_SIZE];
    ehdr[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    ehdr[4] = 2; // ELFCLASS64
    ehdr[5] = 1; // little-endian
    ehdr[6] = 1; // EI_VERSION current
    ehdr[16..18].copy_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
    ehdr[18..20].copy_from_slice(&0x3eu16.to_le_bytes()); // e_machine = EM_X86_64
    ehdr[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
    ehdr[24..32].copy_from_slice(&entry.to_le_bytes());
    ehdr[32..40].copy_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
    ehdr[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    ehdr[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    ehdr[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

    let mut phdr = [0u8; PHDR_SIZE];
    phdr[0..4].copy_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
    phdr[4..8].copy_from_slice(&7u32.to_le_bytes()); // p_flags = R|W|X
    // p_offset (8..16) stays zero: the segment maps the whole file from
    // byte 0, so file offset and in-segment offset coincide.
    phdr[16..24].copy_from_slice(&BASE_ADDR.to_le_bytes()); // p_vaddr
    phdr[24..32].copy_from_slice(&BASE_ADDR.to_le_bytes()); // p_paddr
    phdr[32..40].copy_from_slice(&file_size.to_le_bytes());
    phdr[40..48].copy_from_slice(&mem_size.to_le_bytes());
    phdr[48..56].copy_from_slice(&0x1000u64.to_le_bytes()); // p_align

    out.write_all(&ehdr)?;
    out.write_all(&phdr)?;
    out.write_all(code)?;
    out.write_all(data)?;
    Ok(())
}

/// Write just the raw code bytes, with no ELF wrapper at all.
pub fn write_raw<W: Write>(code: &[u8], out: &mut W) -> io::Result<()> {
    out.write_all(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_header_has_correct_magic_and_class() {
        let mut buf = Vec::new();
        write_elf(&[0x90], &[], 0, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(buf[4], 2);
        assert_eq!(buf[5], 1);
    }

    #[test]
    fn entry_point_is_base_plus_header_size() {
        let mut buf = Vec::new();
        write_elf(&[0x90], &[], 0, &mut buf).unwrap();
        let entry = u64::from_le_bytes(buf[24..32].try_into().unwrap());
        assert_eq!(entry, BASE_ADDR + HEADER_SIZE);
    }

    #[test]
    fn file_size_covers_header_code_and_data() {
        let code = vec![0x90; 10];
        let data = vec![0x00; 4];
        let mut buf = Vec::new();
        write_elf(&code, &data, 0, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE as usize + code.len() + data.len());
        let phdr = &buf[64..120];
        let file_size = u64::from_le_bytes(phdr[32..40].try_into().unwrap());
        assert_eq!(file_size, buf.len() as u64);
    }

    #[test]
    fn mem_size_grows_with_global_footprint() {
        let mut small = Vec::new();
        write_elf(&[0x90], &[], 0, &mut small).unwrap();
        let mut large = Vec::new();
        write_elf(&[0x90], &[], 0x8000, &mut large).unwrap();

        let mem_size_of = |buf: &[u8]| u64::from_le_bytes(buf[64 + 40..64 + 48].try_into().unwrap());
        assert!(mem_size_of(&large) > mem_size_of(&small));
    }

    #[test]
    fn raw_mode_writes_only_code_bytes() {
        let mut buf = Vec::new();
        write_raw(&[1, 2, 3], &mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }
}
