//! The binary itself is not exercised here (no toolchain available to
//! build and run it); these tests cover the parts of the CLI crate that
//! are plain functions over `wave_core`/`wave_object` output.

use std::io::Cursor;

use wave_core::compile_source;

#[test]
fn compiled_output_round_trips_through_the_elf_writer() {
    let out = compile_source(r#"out "hi""#, false).unwrap();
    let mut buf = Vec::new();
    wave_object::write_elf(&out.code, &out.data, out.global_bytes, &mut Cursor::new(&mut buf)).unwrap();
    assert_eq!(&buf[0..4], &[0x7f, b'E', b'L', b'F']);
    assert!(buf.len() > out.code.len());
}

#[test]
fn raw_output_matches_code_bytes_exactly() {
    let out = compile_source("syscall.exit(3)", false).unwrap();
    let mut buf = Vec::new();
    wave_object::write_raw(&out.code, &mut Cursor::new(&mut buf)).unwrap();
    assert_eq!(buf, out.code);
}
