//! Expression and statement compilation.
//!
//! `Compiler` drives a `Cursor` directly against the source text and
//! appends bytes to an `Emitter` as it goes — there is no intermediate
//! tree. Grammar is a single left-to-right precedence level: `a + b * c`
//! compiles as `(a + b) * c`, matching the textual order operators are
//! encountered in rather than any arithmetic precedence table.

use crate::encode::{CompareOp, Emitter};
use crate::error::CompileWarning;
use crate::lexer::{is_ident_start, Cursor};
use crate::telemetry::Telemetry;
use crate::vars::{SymbolTables, VarKind};

/// Block-introducing keywords the compiler recognizes but treats as inert
/// configuration noise: the `{ ... }` body is skipped wholesale without
/// being compiled. Kept as a fixed list rather than "any identifier
/// followed by `{`" so that a real block like `when cond { ... }` is
/// never swallowed by mistake.
const SKIPPED_BLOCK_KEYWORDS: &[&str] = &[
    "pool ", "fate {", "task {", "gpu {", "perf {", "reg {", "sys {", "compiler {",
    "collapse {", "lib {", "env {", "rule ", "intent ", "platform {", "tile {",
    "codegen {", "graphics {", "gui {", "style {", "layout {", "event {", "db {",
    "core {", "kernel {", "linux {", "macos {", "windows {", "driver {",
    "observe {", "field {", "use ",
];

/// No-op compatibility statements: recognized and consumed, but compiled
/// to nothing. Wave's runtime-probed platform/bridge layer has no
/// compile-time representation.
const NOOP_STATEMENTS: &[&str] = &["platform.probe", "bridge.read", "compat.probe"];

pub struct Compiler<'a> {
    cursor: Cursor<'a>,
    pub emitter: Emitter,
    pub syms: SymbolTables,
    pub telemetry: Telemetry,
    pub warnings: Vec<CompileWarning>,
    when_id: u32,
    loop_id: u32,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str) -> Self {
        Compiler {
            cursor: Cursor::new(source),
            emitter: Emitter::new(),
            syms: SymbolTables::new(),
            telemetry: Telemetry::new(),
            warnings: Vec::new(),
            when_id: 0,
            loop_id: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.cursor.set_pos(pos);
    }

    pub fn at_end(&self) -> bool {
        self.cursor.eof()
    }

    /// Pass-1 scan step: if the next statement is an `fn` declaration,
    /// register it and return true; otherwise leave the cursor
    /// untouched and return false.
    pub fn try_compile_fn_decl(&mut self) -> bool {
        self.cursor.skip_whitespace();
        if self.cursor.match_str("fn ") {
            self.compile_fn_def();
            true
        } else {
            false
        }
    }

    /// Pass-1 scan step for anything that isn't an `fn` declaration.
    pub fn skip_line_for_scan(&mut self) {
        self.cursor.skip_line();
    }

    // -- expression compiler ----------------------------------------------

    /// Compile one expression, leaving its value in `rax`. The returned
    /// `i64` mirrors the fold the reference compiler keeps for literal
    /// operands; nothing outside this function consults it, so callers
    /// are free to discard it.
    pub fn compile_expr(&mut self) -> i64 {
        self.cursor.skip_whitespace();
        let mut left = 0i64;

        if self.cursor.peek().is_ascii_digit()
            || (self.cursor.peek() == b'-' && self.cursor.peek_n(1).is_ascii_digit())
        {
            left = self.cursor.parse_number().unwrap_or(0);
            self.emitter.mov_rax_imm(left);
        } else if self.cursor.peek() == b'"' {
            self.compile_inline_string();
        } else if is_ident_start(self.cursor.peek()) {
            left = self.compile_ident_expr();
        } else if self.cursor.peek() == b'(' {
            self.cursor.advance();
            left = self.compile_expr();
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b')' {
                self.cursor.advance();
            }
        } else {
            self.emitter.mov_rax_imm(0);
        }

        self.compile_binary_tail();
        left
    }

    /// Embed a string literal inline in the code stream and leave its
    /// address in `rax` via a RIP-relative `lea`.
    fn compile_inline_string(&mut self) {
        let bytes = self.cursor.parse_string().unwrap_or_default();
        let len = bytes.len();

        self.emitter.raw(&[0xeb, (len + 1) as u8]);
        let str_pos = self.emitter.code.len();
        for &b in &bytes {
            self.emitter.raw(&[b]);
        }
        self.emitter.raw(&[0]);

        let after = self.emitter.code.len();
        let rel = -((after as i64 - str_pos as i64) + 7) as i32;
        self.emitter.raw(&[0x48, 0x8d, 0x05]);
        self.emitter.raw(&rel.to_le_bytes());
    }

    fn compile_ident_expr(&mut self) -> i64 {
        let name = self.cursor.parse_ident().unwrap_or_default();
        self.cursor.skip_whitespace();

        if self.cursor.peek() != b'(' {
            return match self.syms.find_var(&name) {
                Some(v) => {
                    self.emitter.load_storage(v.storage);
                    0
                }
                None => {
                    self.emitter.mov_rax_imm(0);
                    0
                }
            };
        }

        self.cursor.advance();
        self.cursor.skip_whitespace();

        if name == "getchar" {
            self.skip_close_paren();
            self.compile_getchar();
        } else if name == "peek" {
            self.compile_expr();
            self.skip_close_paren();
            self.emitter.movzx_rax_byte_ptr_rax();
        } else if name == "poke" {
            self.compile_expr();
            self.emitter.push_rax();
            self.skip_comma();
            self.compile_expr();
            self.skip_close_paren();
            self.emitter.pop_rbx();
            self.emitter.mov_byte_ptr_rbx_al();
        } else if let Some(sys) = name.strip_prefix("syscall") {
            let syscall_name = if let Some(rest) = sys.strip_prefix('.') {
                rest.to_string()
            } else {
                self.cursor.advance(); // '.'
                self.cursor.parse_ident().unwrap_or_default()
            };
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b'(' {
                self.cursor.advance();
            }
            self.compile_syscall_call(&syscall_name);
            self.cursor.skip_whitespace();
            self.skip_close_paren();
        } else {
            let argc = self.compile_call_args();
            self.emitter.call(&name);
            if argc > 0 {
                self.emitter.add_rsp((argc * 8) as i32);
            }
        }
        0
    }

    fn compile_getchar(&mut self) {
        self.emitter.sub_rsp(16);
        self.emitter.mov_rax_imm(0);
        self.emitter.mov_rdi_imm(0);
        self.emitter.raw(&[0x48, 0x8d, 0x34, 0x24]); // lea rsi, [rsp]
        self.emitter.mov_rdx_imm(1);
        self.emitter.syscall();
        self.emitter.raw(&[0x48, 0x0f, 0xb6, 0x04, 0x24]); // movzx rax, byte [rsp]
        self.emitter.add_rsp(16);
    }

    fn compile_call_args(&mut self) -> usize {
        let mut argc = 0;
        self.cursor.skip_whitespace();
        while self.cursor.peek() != b')' && !self.cursor.eof() {
            self.compile_expr();
            self.emitter.push_rax();
            argc += 1;
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b',' {
                self.cursor.advance();
            }
            self.cursor.skip_whitespace();
        }
        if self.cursor.peek() == b')' {
            self.cursor.advance();
        }
        argc
    }

    /// Shared body for `syscall.xxx(...)` in both expression and
    /// statement position. Arguments are pushed left-to-right then popped
    /// into the System V registers in reverse, except `mmap`'s last
    /// argument which goes straight into `r9`.
    fn compile_syscall_call(&mut self, name: &str) {
        match name {
            "open" => {
                self.compile_expr();
                self.emitter.push_rax();
                self.skip_comma();
                self.compile_expr();
                self.emitter.push_rax();
                self.skip_comma();
                self.compile_expr();
                self.emitter.mov_rdx_rax();
                self.emitter.pop_rax();
                self.emitter.mov_rsi_rax();
                self.emitter.pop_rax();
                self.emitter.mov_rdi_rax();
                self.emitter.mov_rax_imm(2);
                self.emitter.syscall();
            }
            "read" => self.compile_syscall_fd_buf_count(0),
            "write" => self.compile_syscall_fd_buf_count(1),
            "close" => {
                self.compile_expr();
                self.emitter.mov_rdi_rax();
                self.emitter.mov_rax_imm(3);
                self.emitter.syscall();
            }
            "mmap" => {
                self.compile_expr();
                self.emitter.push_rax(); // addr
                self.skip_comma();
                self.compile_expr();
                self.emitter.push_rax(); // len
                self.skip_comma();
                self.compile_expr();
                self.emitter.push_rax(); // prot
                self.skip_comma();
                self.compile_expr();
                self.emitter.push_rax(); // flags
                self.skip_comma();
                self.compile_expr();
                self.emitter.push_rax(); // fd
                self.skip_comma();
                self.compile_expr(); // offset -> r9
                self.emitter.raw(&[0x49, 0x89, 0xc1]); // mov r9, rax
                self.emitter.raw(&[0x41, 0x58]); // pop r8 (fd)
                self.emitter.raw(&[0x41, 0x5a]); // pop r10 (flags)
                self.emitter.pop_rax();
                self.emitter.mov_rdx_rax(); // prot
                self.emitter.pop_rax();
                self.emitter.mov_rsi_rax(); // len
                self.emitter.pop_rax();
                self.emitter.mov_rdi_rax(); // addr
                self.emitter.mov_rax_imm(9);
                self.emitter.syscall();
            }
            _ => {}
        }
    }

    fn compile_syscall_fd_buf_count(&mut self, syscall_num: i64) {
        self.compile_expr();
        self.emitter.push_rax(); // fd
        self.skip_comma();
        self.compile_expr();
        self.emitter.push_rax(); // buf
        self.skip_comma();
        self.compile_expr();
        self.emitter.mov_rdx_rax(); // count
        self.emitter.pop_rax();
        self.emitter.mov_rsi_rax(); // buf
        self.emitter.pop_rax();
        self.emitter.mov_rdi_rax(); // fd
        self.emitter.mov_rax_imm(syscall_num);
        self.emitter.syscall();
    }

    fn compile_binary_tail(&mut self) {
        self.cursor.skip_whitespace();
        loop {
            let op = self.cursor.peek();
            let op2 = self.cursor.peek_n(1);

            if op == b'+' && op2 != b'=' {
                self.cursor.advance();
                self.emitter.push_rax();
                self.compile_expr();
                self.emitter.pop_rbx();
                self.emitter.add_rax_rbx();
            } else if op == b'-' && !op2.is_ascii_digit() && op2 != b'=' {
                self.cursor.advance();
                self.emitter.push_rax();
                self.compile_expr();
                self.emitter.pop_rbx();
                self.emitter.sub_rbx_rax();
            } else if op == b'*' && op2 != b'=' {
                self.cursor.advance();
                self.emitter.push_rax();
                self.compile_expr();
                self.emitter.pop_rbx();
                self.emitter.imul_rax_rbx();
            } else if op == b'/' && op2 != b'=' {
                self.cursor.advance();
                self.emitter.push_rax();
                self.compile_expr();
                self.emitter.mov_rbx_rax();
                self.emitter.pop_rax();
                self.emitter.idiv_rbx();
            } else if op == b'>' && op2 == b'=' {
                self.cursor.advance();
                self.cursor.advance();
                self.compile_compare(CompareOp::Ge);
            } else if op == b'<' && op2 == b'=' {
                self.cursor.advance();
                self.cursor.advance();
                self.compile_compare(CompareOp::Le);
            } else if op == b'=' && op2 == b'=' {
                self.cursor.advance();
                self.cursor.advance();
                self.compile_compare(CompareOp::Eq);
            } else if op == b'!' && op2 == b'=' {
                self.cursor.advance();
                self.cursor.advance();
                self.compile_compare(CompareOp::Ne);
            } else if op == b'>' && op2 != b'>' {
                self.cursor.advance();
                self.compile_compare(CompareOp::Gt);
            } else if op == b'<' && op2 != b'<' {
                self.cursor.advance();
                self.compile_compare(CompareOp::Lt);
            } else {
                break;
            }
        }
    }

    fn compile_compare(&mut self, op: CompareOp) {
        self.emitter.push_rax();
        self.compile_expr();
        self.emitter.pop_rbx();
        self.emitter.cmp_rbx_rax_setcc(op);
    }

    fn skip_comma(&mut self) {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == b',' {
            self.cursor.advance();
        }
        self.cursor.skip_whitespace();
    }

    fn skip_close_paren(&mut self) {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == b')' {
            self.cursor.advance();
        }
    }

    // -- statement compiler -------------------------------------------------

    pub fn compile_statement(&mut self) {
        self.cursor.skip_whitespace();
        if self.cursor.eof() {
            return;
        }
        if self.cursor.peek() == b'#' {
            self.cursor.skip_line();
            return;
        }

        if self.cursor.match_str("out ") {
            self.compile_out();
        } else if self.cursor.match_str("emit ") {
            self.compile_emit();
        } else if self.cursor.match_str("fn ") {
            self.compile_fn_def();
        } else if self.cursor.match_str("when ") {
            self.compile_when();
        } else if self.cursor.match_str("loop") {
            self.cursor.skip_whitespace();
            self.compile_loop();
        } else if self.cursor.match_str("break") {
            self.compile_break();
        } else if self.cursor.match_str("return") {
            self.compile_return();
        } else if self.cursor.match_exact("-> ") {
            self.compile_return();
        } else if self.cursor.match_str("keep") {
            self.emitter.event_loop();
        } else if self.cursor.match_str("fate on") {
            self.telemetry.fate.on = true;
        } else if self.cursor.match_str("fate off") {
            self.telemetry.fate.on = false;
        } else if self.cursor.match_str("limit ") {
            let n = self.cursor.parse_number().unwrap_or(1).max(1);
            self.telemetry.fate.marginal_threshold = 1.0 / n as f64;
        } else if self.cursor.match_exact("syscall.exit(") {
            self.compile_syscall_exit();
        } else if self.cursor.match_exact("syscall.write(") {
            self.compile_syscall_fd_buf_count(1);
            self.skip_close_paren();
        } else if self.cursor.match_exact("syscall.read(") {
            self.compile_syscall_fd_buf_count(0);
            self.skip_close_paren();
        } else if self.cursor.match_exact("syscall.open(") {
            self.compile_syscall_call("open");
            self.skip_close_paren();
        } else if self.cursor.match_exact("syscall.close(") {
            self.compile_expr();
            self.emitter.mov_rdi_rax();
            self.emitter.mov_rax_imm(3);
            self.emitter.syscall();
            self.skip_close_paren();
        } else if self.cursor.match_exact("syscall.mmap(") {
            self.compile_syscall_call("mmap");
            self.skip_close_paren();
        } else if self.cursor.match_exact("poke(") {
            self.compile_expr();
            self.emitter.push_rax();
            self.skip_comma();
            self.compile_expr();
            self.emitter.pop_rbx();
            self.emitter.mov_byte_ptr_rbx_al();
            self.skip_close_paren();
        } else if self.cursor.match_exact("peek(") {
            self.compile_expr();
            self.emitter.movzx_rax_byte_ptr_rax();
            self.skip_close_paren();
        } else if self.cursor.match_exact("getchar()") {
            self.compile_getchar();
        } else if self.cursor.match_exact("putchar(") || self.cursor.match_exact("byte(") {
            self.compile_expr();
            self.skip_close_paren();
            self.compile_emit_single_byte();
        } else if self.cursor.match_str("unified ") || self.cursor.match_exact("unified{") {
            self.parse_unified_block();
        } else if NOOP_STATEMENTS.iter().any(|kw| self.cursor.match_str(kw)) {
            // recognized, intentionally compiled to nothing
        } else if SKIPPED_BLOCK_KEYWORDS.iter().any(|kw| self.cursor.match_exact(kw)) {
            self.skip_block_decl();
        } else if self.cursor.match_str("otherwise") {
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b'{' {
                self.compile_block();
            }
        } else if is_ident_start(self.cursor.peek()) {
            self.compile_assign_or_call();
        } else {
            self.cursor.skip_line();
        }
    }

    fn compile_out(&mut self) {
        self.cursor.skip_whitespace();
        let text = self.cursor.parse_string().unwrap_or_default();
        if text.is_empty() {
            return;
        }
        self.emit_inline_write(&text);
    }

    fn compile_emit(&mut self) {
        self.cursor.skip_whitespace();
        let bytes = self.cursor.parse_string().unwrap_or_default();
        if bytes.is_empty() {
            return;
        }
        self.emit_inline_write(&bytes);
    }

    /// `jmp` over inline data, then `write(1, &data, len)` via a
    /// RIP-relative `lea`. Used by both `out` and `emit` (which differ
    /// only in how the string literal's escapes were interpreted).
    fn emit_inline_write(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        self.emitter.raw(&[0xe9]);
        self.emitter.raw(&(len as i32).to_le_bytes());

        let data_pos = self.emitter.code.len();
        for &b in bytes {
            self.emitter.raw(&[b]);
        }

        self.emitter.mov_rax_imm(1);
        self.emitter.mov_rdi_imm(1);

        let after = self.emitter.code.len();
        let rel = -((after as i64 - data_pos as i64) + 7) as i32;
        self.emitter.raw(&[0x48, 0x8d, 0x35]);
        self.emitter.raw(&rel.to_le_bytes());

        self.emitter.mov_rdx_imm(len as i64);
        self.emitter.syscall();
    }

    /// `putchar(N)` / `byte(N)`: write the single byte already in `al` to
    /// stdout via a one-byte stack scratch slot.
    fn compile_emit_single_byte(&mut self) {
        self.emitter.sub_rsp(16);
        self.emitter.raw(&[0x88, 0x04, 0x24]); // mov [rsp], al
        self.emitter.mov_rax_imm(1);
        self.emitter.mov_rdi_imm(1);
        self.emitter.raw(&[0x48, 0x8d, 0x34, 0x24]); // lea rsi, [rsp]
        self.emitter.mov_rdx_imm(1);
        self.emitter.syscall();
        self.emitter.add_rsp(16);
    }

    fn compile_syscall_exit(&mut self) {
        self.cursor.skip_whitespace();
        let ch = self.cursor.peek();
        if ch.is_ascii_digit() || ch == b'-' {
            let code = self.cursor.parse_number().unwrap_or(0);
            while self.cursor.peek() != b')' && !self.cursor.eof() {
                self.cursor.advance();
            }
            self.skip_close_paren();
            self.emitter.exit_imm(code);
        } else {
            self.compile_expr();
            self.skip_close_paren();
            self.emitter.exit_rax();
        }
    }

    /// Pass 1 only: capture the function's name, parameters and source
    /// body range. Calling this again for the same name (Pass 2 walks
    /// over `fn` declarations too) just refreshes the stored range.
    fn compile_fn_def(&mut self) {
        self.cursor.skip_whitespace();
        let name = match self.cursor.parse_ident() {
            Some(n) => n,
            None => return,
        };

        let mut params = Vec::new();
        self.cursor.skip_whitespace();
        while !self.cursor.eof() && self.cursor.peek() != b'{' && params.len() < crate::vars::MAX_PARAMS {
            if is_ident_start(self.cursor.peek()) {
                if let Some(p) = self.cursor.parse_ident() {
                    params.push(p);
                }
            } else {
                self.cursor.advance();
            }
            self.cursor.skip_whitespace();
        }

        let mut body = None;
        if self.cursor.peek() == b'{' {
            self.cursor.advance();
            let body_pos = self.cursor.pos();
            let mut depth = 1i32;
            while !self.cursor.eof() && depth > 0 {
                match self.cursor.peek() {
                    b'{' => depth += 1,
                    b'}' => depth -= 1,
                    b'"' => {
                        self.cursor.advance();
                        while !self.cursor.eof() && self.cursor.peek() != b'"' {
                            if self.cursor.peek() == b'\\' {
                                self.cursor.advance();
                            }
                            self.cursor.advance();
                        }
                    }
                    b'#' => {
                        while !self.cursor.eof() && self.cursor.peek() != b'\n' {
                            self.cursor.advance();
                        }
                    }
                    _ => {}
                }
                self.cursor.advance();
            }
            let body_end = self.cursor.pos().saturating_sub(1);
            body = Some((body_pos, body_end));
        }

        if let Some(w) = self.syms.add_func(&name, params, body) {
            self.warnings.push(w);
        }
    }

    fn compile_when(&mut self) {
        let id = self.when_id;
        self.when_id += 1;
        let end_label = format!("_when_end_{id}");

        self.cursor.skip_whitespace();
        self.compile_expr();
        self.emitter.test_rax_rax();
        self.emitter.je(&end_label);

        self.cursor.skip_whitespace();
        if self.cursor.peek() == b'{' {
            self.compile_block();
        }
        self.emitter.add_label(&end_label);
    }

    fn compile_loop(&mut self) {
        let id = self.loop_id;
        self.loop_id += 1;
        let start_label = format!("_loop_start_{id}");
        let end_label = format!("_loop_end_{id}");

        if let Some(w) = self.syms.push_loop(start_label.clone(), end_label.clone()) {
            self.warnings.push(w);
        }

        self.emitter.add_label(&start_label);
        self.cursor.skip_whitespace();
        if self.cursor.peek() == b'{' {
            self.compile_block();
        }

        self.telemetry.observe_statement();

        self.emitter.jmp(&start_label);
        self.emitter.add_label(&end_label);
        self.syms.pop_loop();
    }

    fn compile_break(&mut self) {
        if let Some((_, end)) = self.syms.current_loop().cloned() {
            self.emitter.jmp(&end);
        }
    }

    /// `-> value` or `return value`: inside a loop this is a break (jumps
    /// to the loop's end label); outside a loop it is a function return.
    fn compile_return(&mut self) {
        self.cursor.skip_whitespace();
        if !self.cursor.eof() && self.cursor.peek() != b'\n' && self.cursor.peek() != b'}' {
            self.compile_expr();
        }
        if let Some((_, end)) = self.syms.current_loop().cloned() {
            self.emitter.jmp(&end);
        } else {
            self.emitter.epilogue();
        }
    }

    fn compile_assign(&mut self, name: &str) {
        self.cursor.skip_whitespace();
        let storage = match self.syms.find_var(name) {
            Some(v) => v.storage,
            None => self.syms.add_var(name, VarKind::Int).storage,
        };
        self.compile_expr();
        self.emitter.store_storage(storage);
    }

    fn compile_assign_or_call(&mut self) {
        let name = match self.cursor.parse_ident() {
            Some(n) => n,
            None => {
                self.cursor.skip_line();
                return;
            }
        };
        self.cursor.skip_whitespace();

        if self.cursor.peek() == b'=' && self.cursor.peek_n(1) != b'=' {
            self.cursor.advance();
            self.compile_assign(&name);
        } else if self.cursor.peek() == b'(' {
            self.cursor.advance();
            let argc = self.compile_call_args();
            self.emitter.call(&name);
            if argc > 0 {
                self.emitter.add_rsp((argc * 8) as i32);
            }
        } else {
            self.cursor.skip_line();
        }
    }

    pub fn compile_block(&mut self) {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == b'{' {
            self.cursor.advance();
        }
        while !self.cursor.eof() {
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b'}' {
                self.cursor.advance();
                break;
            }
            self.compile_statement();
        }
    }

    fn skip_block_decl(&mut self) {
        while !self.cursor.eof() && self.cursor.peek() != b'{' {
            self.cursor.advance();
        }
        if self.cursor.peek() != b'{' {
            return;
        }
        self.cursor.advance();
        let mut depth = 1i32;
        while !self.cursor.eof() && depth > 0 {
            match self.cursor.peek() {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                b'"' => {
                    self.cursor.advance();
                    while !self.cursor.eof() && self.cursor.peek() != b'"' {
                        if self.cursor.peek() == b'\\' {
                            self.cursor.advance();
                        }
                        self.cursor.advance();
                    }
                }
                b'#' => {
                    while !self.cursor.eof() && self.cursor.peek() != b'\n' {
                        self.cursor.advance();
                    }
                }
                _ => {}
            }
            self.cursor.advance();
        }
    }

    /// `unified { i: v, e: v, r: v }`; accepts both the abbreviated and
    /// spelled-out field names. Uses `parse_float` rather than the
    /// truncating `parse_number` so fractional values round-trip as the
    /// author wrote them.
    fn parse_unified_block(&mut self) {
        self.cursor.skip_whitespace();
        if self.cursor.peek() != b'{' {
            self.cursor.skip_line();
            return;
        }
        self.cursor.advance();

        while !self.cursor.eof() && self.cursor.peek() != b'}' {
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b'}' {
                break;
            }
            let key = match self.cursor.parse_ident() {
                Some(k) => k,
                None => break,
            };
            self.cursor.skip_whitespace();
            if self.cursor.peek() == b':' {
                self.cursor.advance();
            }
            self.cursor.skip_whitespace();
            let val = self.cursor.parse_float().unwrap_or(0.0);

            let field = match key.as_str() {
                "i" | "information_density" => Some("i"),
                "e" | "entropy_gradient" => Some("e"),
                "r" | "relation_strength" => Some("r"),
                _ => None,
            };
            if let Some(f) = field {
                self.telemetry.fate.field.set(f, val);
            }

            self.cursor.skip_whitespace();
            if self.cursor.peek() == b',' {
                self.cursor.advance();
            }
        }
        if self.cursor.peek() == b'}' {
            self.cursor.advance();
        }
    }

    /// Compile a previously-captured function body range with a fresh
    /// local scope and its parameters bound.
    pub fn compile_function_body(&mut self, body: (usize, usize), params: &[String]) {
        let scope = self.syms.enter_function(params);
        let saved_pos = self.cursor.pos();

        self.cursor.set_pos(body.0);
        while self.cursor.pos() < body.1 {
            self.compile_statement();
        }

        self.cursor.set_pos(saved_pos);
        self.syms.exit_function(scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled_bytes(src: &str) -> Vec<u8> {
        let mut c = Compiler::new(src);
        while !c.at_end() {
            c.compile_statement();
        }
        c.emitter.code.as_slice().to_vec()
    }

    #[test]
    fn literal_addition_folds_left_to_right() {
        let bytes = compiled_bytes("x = 1 + 2");
        // mov rax,1(10) then push/mov rax,2(10)/pop/add(3) then store(depends on global store 1+9+2=12 bytes)
        assert!(bytes.len() > 10);
    }

    #[test]
    fn when_emits_test_and_conditional_jump() {
        let bytes = compiled_bytes("when 1 { }");
        assert!(bytes.windows(2).any(|w| w == [0x0f, 0x84]));
    }

    #[test]
    fn skipped_block_keyword_consumes_balanced_braces() {
        let mut c = Compiler::new("gpu { nested { } more }\nout \"x\"");
        c.compile_statement();
        assert_eq!(c.emitter.code.len(), 0);
        c.compile_statement();
        assert!(c.emitter.code.len() > 0);
    }

    #[test]
    fn break_outside_loop_is_a_no_op() {
        let bytes = compiled_bytes("break");
        assert!(bytes.is_empty());
    }

    #[test]
    fn assignment_reuses_existing_variable_storage() {
        let mut c = Compiler::new("x = 1\nx = 2");
        c.compile_statement();
        c.compile_statement();
        assert_eq!(c.syms.var_count(), 1);
    }

    #[test]
    fn unified_block_sets_float_fields_without_truncation() {
        let mut c = Compiler::new("unified { i: 0.9, e: 0.1, r: 0.5 }");
        c.compile_statement();
        assert!((c.telemetry.fate.field.i - 0.9).abs() < 1e-9);
        assert_eq!(c.emitter.code.len(), 0);
    }
}
