// This module is the x86-64 instruction translator backend: X64Encoder appends the exact
// machine-code template for each tape operation to a CodeBuffer. The cursor lives in r13
// for the whole generated function. Because r13 is callee-saved in the System V ABI the
// prologue pushes it before loading the tape base with a 64-bit immediate move, and the
// epilogue pops it before returning. Cell arithmetic is a byte-sized add/sub on [r13+0].
// I/O is done with raw syscalls: the call number, file descriptor, buffer (r13) and
// length 1 go into rax/rdi/rsi/rdx before `syscall`. Loop brackets compile to a compare of
// the current cell against zero followed by a near conditional jump whose rel32 field is
// resolved through the label table, which keeps the emitted bytes identical to manual
// placeholder patching.

//! x86-64 machine code templates.

use crate::core::code_buffer::CodeBuffer;
use crate::core::config::SyscallAbi;
use crate::core::error::JitResult;
use crate::core::resolver::{Label, Labels};

/// Near conditional jumps used for loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    /// `jz rel32` (0F 84).
    Zero,
    /// `jnz rel32` (0F 85).
    NotZero,
}

impl JumpCondition {
    fn opcode(self) -> [u8; 2] {
        match self {
            JumpCondition::Zero => [0x0F, 0x84],
            JumpCondition::NotZero => [0x0F, 0x85],
        }
    }
}

/// `push r13`
pub const PUSH_R13: [u8; 2] = [0x41, 0x55];
/// `pop r13`
pub const POP_R13: [u8; 2] = [0x41, 0x5D];
/// `movabs r13, imm64` without the immediate.
pub const MOVABS_R13: [u8; 2] = [0x49, 0xBD];
/// `inc r13`
pub const INC_R13: [u8; 3] = [0x49, 0xFF, 0xC5];
/// `dec r13`
pub const DEC_R13: [u8; 3] = [0x49, 0xFF, 0xCD];
/// `add byte [r13+0], 1`
pub const ADD_CELL_1: [u8; 5] = [0x41, 0x80, 0x45, 0x00, 0x01];
/// `sub byte [r13+0], 1`
pub const SUB_CELL_1: [u8; 5] = [0x41, 0x80, 0x6D, 0x00, 0x01];
/// `cmp byte [r13+0], 0`
pub const CMP_CELL_0: [u8; 5] = [0x41, 0x80, 0x7D, 0x00, 0x00];
/// `mov rsi, r13`
pub const MOV_RSI_R13: [u8; 3] = [0x4C, 0x89, 0xEE];
pub const SYSCALL: [u8; 2] = [0x0F, 0x05];
pub const RET: u8 = 0xC3;

/// Size of the prologue emitted by [`X64Encoder::prologue`].
pub const PROLOGUE_LEN: usize = PUSH_R13.len() + MOVABS_R13.len() + 8;
/// Size of a compare followed by a near conditional jump.
pub const LOOP_EDGE_LEN: usize = CMP_CELL_0.len() + 6;
/// Size of one read or write syscall sequence.
pub const SYSCALL_SEQ_LEN: usize = 7 + 7 + MOV_RSI_R13.len() + 7 + SYSCALL.len();

/// Emits tape-machine templates into a code buffer.
#[derive(Debug, Default)]
pub struct X64Encoder {
    code: CodeBuffer,
    labels: Labels,
}

impl X64Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the cursor register and point it at the tape.
    pub fn prologue(&mut self, tape_base: u64) {
        self.code.emit_bytes(&PUSH_R13);
        self.code.emit_bytes(&MOVABS_R13);
        self.code.emit_u64(tape_base);
    }

    /// Restore the cursor register and return to the caller.
    pub fn epilogue(&mut self) {
        self.code.emit_bytes(&POP_R13);
        self.code.emit_u8(RET);
    }

    pub fn inc_cursor(&mut self) {
        self.code.emit_bytes(&INC_R13);
    }

    pub fn dec_cursor(&mut self) {
        self.code.emit_bytes(&DEC_R13);
    }

    pub fn inc_cell(&mut self) {
        self.code.emit_bytes(&ADD_CELL_1);
    }

    pub fn dec_cell(&mut self) {
        self.code.emit_bytes(&SUB_CELL_1);
    }

    /// `write(1, r13, 1)`
    pub fn write_cell(&mut self, abi: SyscallAbi) {
        self.syscall_one_byte(abi.write_nr(), 1);
    }

    /// `read(0, r13, 1)`
    pub fn read_cell(&mut self, abi: SyscallAbi) {
        self.syscall_one_byte(abi.read_nr(), 0);
    }

    fn syscall_one_byte(&mut self, nr: u32, fd: u32) {
        // mov rax, nr
        self.code.emit_bytes(&[0x48, 0xC7, 0xC0]);
        self.code.emit_u32(nr);
        // mov rdi, fd
        self.code.emit_bytes(&[0x48, 0xC7, 0xC7]);
        self.code.emit_u32(fd);
        self.code.emit_bytes(&MOV_RSI_R13);
        // mov rdx, 1
        self.code.emit_bytes(&[0x48, 0xC7, 0xC2]);
        self.code.emit_u32(1);
        self.code.emit_bytes(&SYSCALL);
    }

    pub fn cmp_cell_zero(&mut self) {
        self.code.emit_bytes(&CMP_CELL_0);
    }

    /// Emit a near conditional jump to `target`.
    pub fn jcc(&mut self, condition: JumpCondition, target: Label) -> JitResult<()> {
        self.code.emit_bytes(&condition.opcode());
        self.labels.emit_rel32(&mut self.code, target)
    }

    pub fn create_label(&mut self) -> Label {
        self.labels.create()
    }

    /// Bind `label` here; returns the rel32 fields that were patched.
    pub fn bind(&mut self, label: Label) -> JitResult<Vec<usize>> {
        self.labels.bind(&mut self.code, label)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    /// Check every label is resolved and hand out the finished buffer.
    pub fn finish(self) -> JitResult<CodeBuffer> {
        self.labels.finish()?;
        Ok(self.code)
    }
}
