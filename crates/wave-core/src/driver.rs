//! Whole-program compilation: the three-pass sequence that turns a
//! complete source string into a finished, fixed-up code/data image.
//!
//! Pass 1 scans for every `fn` declaration and records its signature and
//! body range without emitting code. Pass 2 compiles the program's
//! top-level statements in order, including `fn` lines again — `add_func`
//! is an upsert, so re-seeing a declaration here just refreshes its
//! range rather than duplicating the entry the reference compiler
//! guarded against with a save/restore of `func_count`. Pass 3 emits each
//! captured function body once, after the entry point's `exit(0)`.

use crate::compile::Compiler;
use crate::error::{CompileWarning, StrictModeError};

/// Everything the object writer and the CLI report need out of a
/// successful compile.
#[derive(Debug)]
pub struct CompileOutput {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub var_count: usize,
    pub func_count: usize,
    pub global_bytes: u64,
    pub unified_i: f64,
    pub unified_e: f64,
    pub unified_r: f64,
    pub tile_used: u64,
    pub tile_pool_count: usize,
    pub fate_dynamic: bool,
    pub platform_id: u32,
    pub platform_syscall_base: u64,
    pub warnings: Vec<CompileWarning>,
}

/// Compile `source` end to end. If `strict` is set and any warning was
/// raised (an unresolved fixup, a dropped write, a full table), the
/// whole compile fails with `StrictModeError` instead of returning a
/// best-effort image.
pub fn compile(source: &str, strict: bool) -> Result<CompileOutput, StrictModeError> {
    let mut c = Compiler::new(source);

    c.emitter.prologue();
    c.emitter.sub_rsp(512);

    // Pass 1: collect every `fn` declaration's signature and body range.
    log::debug!("pass 1: scanning for fn declarations");
    let saved_pos = c.pos();
    while !c.at_end() {
        collect_fn_decl(&mut c);
    }
    c.set_pos(saved_pos);
    log::debug!("pass 1 complete: {} functions", c.syms.func_count());

    // Pass 2: compile the top-level program. `fn` lines are revisited
    // (add_func upserts) but contribute no code here.
    log::debug!("pass 2: compiling top-level statements");
    while !c.at_end() {
        c.compile_statement();
    }

    c.emitter.exit_imm(0);

    // Pass 3: emit each function's body once, after the program exit.
    log::debug!("pass 3: emitting function bodies");
    let funcs: Vec<_> = c
        .syms
        .funcs()
        .iter()
        .filter_map(|f| f.body.map(|b| (f.name.clone(), f.params.clone(), b)))
        .collect();
    for (name, params, body) in funcs {
        if body.1 <= body.0 {
            continue;
        }
        let offset = c.emitter.code.len();
        c.syms.set_func_code_offset(&name, offset);
        c.emitter.add_label(&name);

        c.emitter.prologue();
        c.emitter.sub_rsp(256);
        c.compile_function_body(body, &params);
        c.emitter.add_rsp(256);
        c.emitter.pop_rbp();
        c.emitter.ret();
    }

    let mut warnings = c.warnings;
    warnings.extend(c.emitter.resolve_fixups());
    warnings.extend(c.emitter.capacity_warnings());

    for w in &warnings {
        log::warn!("{w}");
    }

    if strict && !warnings.is_empty() {
        return Err(StrictModeError { warnings });
    }

    Ok(CompileOutput {
        code: c.emitter.code.as_slice().to_vec(),
        data: c.emitter.data.as_slice().to_vec(),
        var_count: c.syms.var_count(),
        func_count: c.syms.func_count(),
        global_bytes: c.syms.global_bytes(),
        unified_i: c.telemetry.fate.field.i,
        unified_e: c.telemetry.fate.field.e,
        unified_r: c.telemetry.fate.field.r,
        tile_used: c.telemetry.tiles.total_used(),
        tile_pool_count: c.telemetry.tiles.pool_count(),
        fate_dynamic: c.telemetry.fate.on,
        platform_id: c.telemetry.platform.id,
        platform_syscall_base: c.telemetry.platform.syscall_base,
        warnings,
    })
}

/// Pass-1 helper: advance one line at a time, registering any `fn`
/// declaration found and skipping everything else without compiling it.
fn collect_fn_decl(c: &mut Compiler) {
    // `Compiler` has no public "peek a keyword without consuming"
    // primitive, so pass 1 reuses the real statement compiler's `fn`
    // path directly and otherwise just walks past one line. This mirrors
    // the reference compiler's own pass 1, which called the same
    // `compile_fn_def` it used in pass 2.
    if c.try_compile_fn_decl() {
        return;
    }
    c.skip_line_for_scan();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_compiles_to_bare_exit() {
        let out = compile("", false).unwrap();
        assert!(!out.code.is_empty());
        assert_eq!(out.func_count, 0);
    }

    #[test]
    fn forward_called_function_resolves() {
        let out = compile("greet()\nfn greet { out \"hi\" }", false).unwrap();
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn strict_mode_rejects_unresolved_fixup() {
        let out = compile("when missing() { }", false).unwrap();
        assert!(!out.warnings.is_empty());
        let err = compile("when missing() { }", true).unwrap_err();
        assert!(!err.warnings.is_empty());
    }

    #[test]
    fn unified_block_does_not_change_emitted_bytes() {
        let plain = compile("out \"hi\"", false).unwrap();
        let with_unified = compile("unified { i: 0.9, e: 0.1, r: 0.5 }\nout \"hi\"", false).unwrap();
        assert_eq!(plain.code, with_unified.code);
    }
}
