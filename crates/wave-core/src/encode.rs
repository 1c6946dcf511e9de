//! x86-64 System V instruction encoders.
//!
//! `Emitter` owns the code buffer, the data buffer and the label/fixup
//! table; each method here is a pure appender for one fixed instruction —
//! none of them branch on compiler state. The register convention
//! throughout is "right operand in the accumulator (rax), left operand in
//! the scratch register (rbx), result in rax", matching the calling
//! convention in `crate::vars` and the expression compiler in
//! `crate::compile::expr`.

use crate::buffer::{ByteBuffer, DEFAULT_CODE_CAPACITY, DEFAULT_DATA_CAPACITY};
use crate::error::CompileWarning;
use crate::label::LabelTable;
use crate::vars::Storage;

/// The six comparison operators the expression compiler recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The SETcc opcode byte (second byte of the two-byte `0f 9x` form).
    fn setcc_byte(self) -> u8 {
        match self {
            CompareOp::Eq => 0x94,
            CompareOp::Ne => 0x95,
            CompareOp::Lt => 0x9c,
            CompareOp::Le => 0x9e,
            CompareOp::Gt => 0x9f,
            CompareOp::Ge => 0x9d,
        }
    }
}

pub struct Emitter {
    pub code: ByteBuffer,
    pub data: ByteBuffer,
    labels: LabelTable,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            code: ByteBuffer::new(DEFAULT_CODE_CAPACITY),
            data: ByteBuffer::new(DEFAULT_DATA_CAPACITY),
            labels: LabelTable::new(),
        }
    }

    pub fn with_capacities(code_cap: usize, data_cap: usize) -> Self {
        Emitter {
            code: ByteBuffer::new(code_cap),
            data: ByteBuffer::new(data_cap),
            labels: LabelTable::new(),
        }
    }

    // -- labels & fixups -----------------------------------------------

    pub fn add_label(&mut self, name: &str) {
        self.labels.add_label(name, self.code.len());
    }

    /// Record a forward reference at the current offset and emit the
    /// four placeholder zero bytes that `resolve_fixups` will patch.
    pub fn add_fixup(&mut self, name: &str) {
        self.labels.add_fixup(name, self.code.len());
        self.code.put4(0);
    }

    pub fn resolve_fixups(&mut self) -> Vec<CompileWarning> {
        self.labels.resolve(&mut self.code)
    }

    pub fn capacity_warnings(&self) -> Vec<CompileWarning> {
        let mut warnings = Vec::new();
        if self.code.dropped_bytes() > 0 {
            warnings.push(CompileWarning::CapacityExceeded {
                buffer: crate::error::BufferKind::Code,
                dropped: self.code.dropped_bytes(),
            });
        }
        if self.data.dropped_bytes() > 0 {
            warnings.push(CompileWarning::CapacityExceeded {
                buffer: crate::error::BufferKind::Data,
                dropped: self.data.dropped_bytes(),
            });
        }
        warnings
    }

    // -- register save/restore, frame setup/teardown --------------------

    pub fn push_rbp(&mut self) {
        self.code.put1(0x55);
    }
    pub fn pop_rbp(&mut self) {
        self.code.put1(0x5d);
    }
    pub fn push_rax(&mut self) {
        self.code.put1(0x50);
    }
    pub fn pop_rax(&mut self) {
        self.code.put1(0x58);
    }
    pub fn push_rbx(&mut self) {
        self.code.put1(0x53);
    }
    pub fn pop_rbx(&mut self) {
        self.code.put1(0x5b);
    }

    pub fn mov_rbp_rsp(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xe5]);
    }
    pub fn mov_rsp_rbp(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xec]);
    }
    pub fn ret(&mut self) {
        self.code.put1(0xc3);
    }
    pub fn syscall(&mut self) {
        self.code.put_bytes(&[0x0f, 0x05]);
    }
    pub fn pause(&mut self) {
        self.code.put_bytes(&[0xf3, 0x90]);
    }
    pub fn nop(&mut self) {
        self.code.put1(0x90);
    }

    pub fn prologue(&mut self) {
        self.push_rbp();
        self.mov_rbp_rsp();
    }

    pub fn epilogue(&mut self) {
        self.mov_rsp_rbp();
        self.pop_rbp();
        self.ret();
    }

    /// `pause; jmp $-4` — spins on the pause instruction forever.
    pub fn event_loop(&mut self) {
        self.pause();
        self.code.put_bytes(&[0xeb, 0xfc]);
    }

    // -- stack adjust -----------------------------------------------------

    pub fn sub_rsp(&mut self, n: i32) {
        self.code.put_bytes(&[0x48, 0x81, 0xec]);
        self.code.put_i32(n);
    }

    pub fn add_rsp(&mut self, n: i32) {
        self.code.put_bytes(&[0x48, 0x81, 0xc4]);
        self.code.put_i32(n);
    }

    // -- immediate loads --------------------------------------------------

    pub fn mov_rax_imm(&mut self, v: i64) {
        self.code.put_bytes(&[0x48, 0xb8]);
        self.code.put8(v as u64);
    }
    pub fn mov_rdi_imm(&mut self, v: i64) {
        self.code.put_bytes(&[0x48, 0xbf]);
        self.code.put8(v as u64);
    }
    pub fn mov_rsi_imm(&mut self, v: i64) {
        self.code.put_bytes(&[0x48, 0xbe]);
        self.code.put8(v as u64);
    }
    pub fn mov_rdx_imm(&mut self, v: i64) {
        self.code.put_bytes(&[0x48, 0xba]);
        self.code.put8(v as u64);
    }

    // -- register moves -----------------------------------------------------

    pub fn mov_rdi_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xc7]);
    }
    pub fn mov_rsi_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xc6]);
    }
    pub fn mov_rdx_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xc2]);
    }
    pub fn mov_rcx_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xc1]);
    }
    pub fn mov_rbx_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xc3]);
    }
    pub fn mov_rax_rbx(&mut self) {
        self.code.put_bytes(&[0x48, 0x89, 0xd8]);
    }

    // -- frame-relative memory ------------------------------------------

    pub fn mov_rax_rbp_off(&mut self, off: i32) {
        self.code.put_bytes(&[0x48, 0x8b, 0x85]);
        self.code.put_i32(off);
    }

    pub fn mov_rbp_off_rax(&mut self, off: i32) {
        self.code.put_bytes(&[0x48, 0x89, 0x85]);
        self.code.put_i32(off);
    }

    // -- absolute memory (globals) ----------------------------------------

    /// `movabs rax, addr; mov rax, [rax]` — load-safe, no register is
    /// clobbered before the value is materialized.
    pub fn mov_rax_abs(&mut self, addr: u64) {
        self.code.put_bytes(&[0x48, 0xb8]);
        self.code.put8(addr);
        self.code.put_bytes(&[0x48, 0x8b, 0x00]);
    }

    /// `push rax; movabs rbx, addr; pop rax; mov [rbx], rax`
    pub fn mov_abs_rax(&mut self, addr: u64) {
        self.push_rax();
        self.code.put_bytes(&[0x48, 0xbb]);
        self.code.put8(addr);
        self.pop_rax();
        self.code.put_bytes(&[0x48, 0x89, 0x03]);
    }

    pub fn load_storage(&mut self, storage: Storage) {
        match storage {
            Storage::Global(addr) => self.mov_rax_abs(addr),
            Storage::Local(off) => self.mov_rax_rbp_off(off),
        }
    }

    pub fn store_storage(&mut self, storage: Storage) {
        match storage {
            Storage::Global(addr) => self.mov_abs_rax(addr),
            Storage::Local(off) => self.mov_rbp_off_rax(off),
        }
    }

    // -- arithmetic (scratch=rbx OP accumulator=rax -> rax) ----------------

    /// `add rax, rbx`
    pub fn add_rax_rbx(&mut self) {
        self.code.put_bytes(&[0x48, 0x01, 0xd8]);
    }

    /// left (rbx) - right (rax): `mov rcx, rax; mov rax, rbx; sub rax, rcx`
    pub fn sub_rbx_rax(&mut self) {
        self.mov_rcx_rax();
        self.mov_rax_rbx();
        self.code.put_bytes(&[0x48, 0x29, 0xc8]);
    }

    /// `imul rax, rbx`
    pub fn imul_rax_rbx(&mut self) {
        self.code.put_bytes(&[0x48, 0x0f, 0xaf, 0xc3]);
    }

    /// left (rax, already restored by caller) / right (rbx): `cqo; idiv rbx`
    pub fn idiv_rbx(&mut self) {
        self.code.put_bytes(&[0x48, 0x99]);
        self.code.put_bytes(&[0x48, 0xf7, 0xfb]);
    }

    /// `cmp rbx, rax; setcc al; movzx rax, al`
    pub fn cmp_rbx_rax_setcc(&mut self, op: CompareOp) {
        self.code.put_bytes(&[0x48, 0x39, 0xc3]);
        self.code.put_bytes(&[0x0f, op.setcc_byte(), 0xc0]);
        self.code.put_bytes(&[0x48, 0x0f, 0xb6, 0xc0]);
    }

    // -- control flow -------------------------------------------------------

    pub fn test_rax_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x85, 0xc0]);
    }

    pub fn je(&mut self, label: &str) {
        self.code.put_bytes(&[0x0f, 0x84]);
        self.add_fixup(label);
    }

    pub fn jne(&mut self, label: &str) {
        self.code.put_bytes(&[0x0f, 0x85]);
        self.add_fixup(label);
    }

    pub fn jmp(&mut self, label: &str) {
        self.code.put1(0xe9);
        self.add_fixup(label);
    }

    pub fn call(&mut self, label: &str) {
        self.code.put1(0xe8);
        self.add_fixup(label);
    }

    pub fn exit_imm(&mut self, code: i64) {
        self.mov_rax_imm(60);
        self.mov_rdi_imm(code);
        self.syscall();
    }

    /// Exit with the status already in rax.
    pub fn exit_rax(&mut self) {
        self.mov_rdi_rax();
        self.mov_rax_imm(60);
        self.syscall();
    }

    // -- misc used by built-ins -------------------------------------------

    /// `movzx rax, byte [rax]`
    pub fn movzx_rax_byte_ptr_rax(&mut self) {
        self.code.put_bytes(&[0x48, 0x0f, 0xb6, 0x00]);
    }

    /// `mov [rbx], al`
    pub fn mov_byte_ptr_rbx_al(&mut self) {
        self.code.put_bytes(&[0x88, 0x03]);
    }

    /// `lea rsp, [rsp]` style raw bytes escape hatch for the rarer forms
    /// used directly by the statement/expression compiler (reading into
    /// the 16-byte stack scratch for `getchar`/`putchar`, syscall register
    /// shuffles for `mmap`). Kept as a thin pass-through rather than a
    /// named method per sequence, since these are one-off compositions of
    /// bytes rather than a reusable instruction.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.code.put_bytes(bytes);
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_imm_matches_reference_bytes() {
        let mut e = Emitter::new();
        e.exit_imm(7);
        assert_eq!(
            e.code.as_slice(),
            &[
                0x48, 0xb8, 7, 0, 0, 0, 0, 0, 0, 0, // movabs rax, 7
                0x48, 0xbf, 7, 0, 0, 0, 0, 0, 0, 0, // movabs rdi, 7
                0x0f, 0x05, // syscall
            ]
        );
    }

    #[test]
    fn comparison_uses_scratch_cmp_accumulator() {
        let mut e = Emitter::new();
        e.cmp_rbx_rax_setcc(CompareOp::Lt);
        assert_eq!(
            e.code.as_slice(),
            &[0x48, 0x39, 0xc3, 0x0f, 0x9c, 0xc0, 0x48, 0x0f, 0xb6, 0xc0]
        );
    }

    #[test]
    fn event_loop_jumps_back_to_pause() {
        let mut e = Emitter::new();
        e.event_loop();
        assert_eq!(e.code.as_slice(), &[0xf3, 0x90, 0xeb, 0xfc]);
    }
}
