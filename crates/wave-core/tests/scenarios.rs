//! End-to-end scenarios exercised against the compiled byte buffer
//! rather than an executed binary (no Rust toolchain or emulator
//! available at test-authoring time, only byte-level assertions).

use wave_core::compile_source;

#[test]
fn empty_program_exits_cleanly_with_no_warnings() {
    let out = compile_source("", false).unwrap();
    assert!(out.warnings.is_empty());
    assert_eq!(out.func_count, 0);
    assert_eq!(out.var_count, 0);
}

#[test]
fn out_statement_embeds_string_and_writes_it() {
    let out = compile_source(r#"out "hello""#, false).unwrap();
    assert!(out.code.windows(5).any(|w| w == b"hello"));
}

#[test]
fn loop_with_break_jumps_forward_out_of_the_loop() {
    let out = compile_source("loop { when 1 { break } }", false).unwrap();
    assert!(out.warnings.is_empty());
}

#[test]
fn function_call_before_definition_resolves_via_two_pass_scan() {
    let out = compile_source("result = add(1, 2)\nfn add a b { -> a + b }", false).unwrap();
    assert!(out.warnings.is_empty());
    assert_eq!(out.func_count, 1);
    assert_eq!(out.var_count, 1);
}

#[test]
fn variable_assignment_reuses_the_same_global_slot() {
    let out = compile_source("counter = 1\ncounter = counter + 1", false).unwrap();
    assert_eq!(out.var_count, 1);
}

#[test]
fn unified_block_reports_rounded_values_without_altering_codegen() {
    let without = compile_source("out \"x\"", false).unwrap();
    let with = compile_source("unified { i: 0.9, e: 0.1, r: 0.5 }\nout \"x\"", false).unwrap();
    assert_eq!(without.code, with.code);
    assert!((with.unified_i - 0.9).abs() < 1e-9);
    assert!((with.unified_e - 0.1).abs() < 1e-9);
    assert!((with.unified_r - 0.5).abs() < 1e-9);
}

#[test]
fn skipped_block_declarations_consume_nested_braces_without_emitting_code() {
    let out = compile_source("gpu { a { b { } } }\nout \"done\"", false).unwrap();
    assert!(out.code.windows(4).any(|w| w == b"done"));
}

#[test]
fn strict_mode_turns_unresolved_fixups_into_an_error() {
    let result = compile_source("when never_defined() { }", true);
    assert!(result.is_err());
}

#[test]
fn permissive_mode_leaves_unresolved_call_fixup_as_zero_and_warns() {
    let out = compile_source("missing_fn()", false).unwrap();
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn syscall_exit_with_literal_uses_the_optimized_immediate_path() {
    let literal = compile_source("syscall.exit(7)", false).unwrap();
    let expr = compile_source("n = 7\nsyscall.exit(n)", false).unwrap();
    // the literal path omits the variable load + epilogue-adjacent moves
    // the expression path needs, so it must be the shorter of the two.
    assert!(literal.code.len() < expr.code.len());
}
