use wave_object::{write_elf, write_raw, BASE_ADDR, HEADER_SIZE};

#[test]
fn program_headers_land_right_after_the_elf_header() {
    let mut buf = Vec::new();
    write_elf(&[0x90, 0x90], &[], 0, &mut buf).unwrap();
    let phoff = u64::from_le_bytes(buf[32..40].try_into().unwrap());
    assert_eq!(phoff, 64);
}

#[test]
fn code_starts_exactly_at_the_entry_point_offset() {
    let code = vec![0xc3];
    let mut buf = Vec::new();
    write_elf(&code, &[], 0, &mut buf).unwrap();
    assert_eq!(buf[HEADER_SIZE as usize], 0xc3);
    assert_eq!(BASE_ADDR + HEADER_SIZE, BASE_ADDR + 120);
}

#[test]
fn raw_output_has_no_header_at_all() {
    let mut buf = Vec::new();
    write_raw(&[0xc3], &mut buf).unwrap();
    assert_eq!(buf, vec![0xc3]);
}
