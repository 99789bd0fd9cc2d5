//! x86-64 instruction encoding for JIT compilation.
//!
//! Only the instructions the baseline compiler needs are provided. Every
//! encoding produced here can be read back by `x86_64_disasm`.

use super::codebuf::{CodeBuffer, Jump, Label};

/// x86-64 general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    /// Get the register code (lower 3 bits).
    pub fn code(self) -> u8 {
        (self as u8) & 0x7
    }

    /// Check if this register requires REX.B or REX.R extension.
    pub fn needs_rex_ext(self) -> bool {
        (self as u8) >= 8
    }

    /// REX.B bit for this register (when used as base/rm).
    pub fn rex_b(self) -> u8 {
        if self.needs_rex_ext() { 0x01 } else { 0x00 }
    }

    /// REX.R bit for this register (when used as reg).
    pub fn rex_r(self) -> u8 {
        if self.needs_rex_ext() { 0x04 } else { 0x00 }
    }
}

/// x86-64 condition codes (for Jcc and SETcc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    O = 0x0,  // Overflow
    No = 0x1, // Not overflow
    B = 0x2,  // Below (unsigned <)
    Ae = 0x3, // Above or equal (unsigned >=)
    E = 0x4,  // Equal
    Ne = 0x5, // Not equal
    Be = 0x6, // Below or equal (unsigned <=)
    A = 0x7,  // Above (unsigned >)
    S = 0x8,  // Sign (negative)
    Ns = 0x9, // Not sign (non-negative)
    P = 0xA,  // Parity even
    Np = 0xB, // Parity odd
    L = 0xC,  // Less (signed <)
    Ge = 0xD, // Greater or equal (signed >=)
    Le = 0xE, // Less or equal (signed <=)
    G = 0xF,  // Greater (signed >)
}

/// ALU operations sharing the `op r/m64, r64` and `81/83 /n` encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alu {
    Add,
    Or,
    Sub,
    Xor,
    Cmp,
}

impl Alu {
    /// Opcode of the `op r/m64, r64` form.
    fn rr_opcode(self) -> u8 {
        match self {
            Alu::Add => 0x01,
            Alu::Or => 0x09,
            Alu::Sub => 0x29,
            Alu::Xor => 0x31,
            Alu::Cmp => 0x39,
        }
    }

    /// ModR/M reg field of the immediate form.
    fn ext(self) -> u8 {
        match self {
            Alu::Add => 0,
            Alu::Or => 1,
            Alu::Sub => 5,
            Alu::Xor => 6,
            Alu::Cmp => 7,
        }
    }
}

/// x86-64 assembler.
pub struct X86_64Assembler<'a> {
    buf: &'a mut CodeBuffer,
}

impl<'a> X86_64Assembler<'a> {
    pub fn new(buf: &'a mut CodeBuffer) -> Self {
        Self { buf }
    }

    /// Label for the next instruction emitted.
    pub fn label(&self) -> Label {
        self.buf.label()
    }

    pub fn link_jump(&mut self, jump: Jump, target: Label) {
        self.buf.link_jump(jump, target);
    }

    pub fn link_jump_here(&mut self, jump: Jump) {
        self.buf.link_jump_here(jump);
    }

    // ==================== REX / ModR/M helpers ====================

    /// Emit REX.W prefix for 64-bit operations.
    fn emit_rex_w(&mut self, reg: Reg, rm: Reg) {
        self.buf.emit_u8(0x48 | reg.rex_r() | rm.rex_b());
    }

    /// Emit REX.W prefix for single register operations.
    fn emit_rex_w_single(&mut self, rm: Reg) {
        self.buf.emit_u8(0x48 | rm.rex_b());
    }

    fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
        ((mode & 0x3) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
    }

    /// ModR/M (+ SIB + displacement) for `[base + disp]`.
    fn emit_mem_operand(&mut self, reg: u8, base: Reg, disp: i32) {
        let needs_sib = base.code() == 0b100; // RSP/R12
        let rbp_like = base.code() == 0b101; // RBP/R13 have no mod=00 form

        let (mode, disp_bytes) = if disp == 0 && !rbp_like {
            (0b00, 0)
        } else if (-128..=127).contains(&disp) {
            (0b01, 1)
        } else {
            (0b10, 4)
        };

        self.buf.emit_u8(Self::modrm(mode, reg, base.code()));
        if needs_sib {
            self.buf.emit_u8(0x24); // SIB: no index, base=rm
        }
        match disp_bytes {
            1 => self.buf.emit_u8(disp as u8),
            4 => self.buf.emit_u32(disp as u32),
            _ => {}
        }
    }

    fn alu_rr(&mut self, op: Alu, dst: Reg, src: Reg) {
        self.emit_rex_w(src, dst);
        self.buf.emit_u8(op.rr_opcode());
        self.buf.emit_u8(Self::modrm(0b11, src.code(), dst.code()));
    }

    fn alu_ri32(&mut self, op: Alu, dst: Reg, imm: i32) {
        self.emit_rex_w_single(dst);
        if (-128..=127).contains(&imm) {
            self.buf.emit_u8(0x83);
            self.buf.emit_u8(Self::modrm(0b11, op.ext(), dst.code()));
            self.buf.emit_u8(imm as u8);
        } else {
            self.buf.emit_u8(0x81);
            self.buf.emit_u8(Self::modrm(0b11, op.ext(), dst.code()));
            self.buf.emit_u32(imm as u32);
        }
    }

    // ==================== Data Movement ====================

    /// MOV r64, r64
    pub fn mov_rr(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w(src, dst);
        self.buf.emit_u8(0x89);
        self.buf.emit_u8(Self::modrm(0b11, src.code(), dst.code()));
    }

    /// MOV r64, imm64
    pub fn mov_ri64(&mut self, dst: Reg, imm: i64) {
        self.emit_rex_w_single(dst);
        self.buf.emit_u8(0xB8 + dst.code());
        self.buf.emit_u64(imm as u64);
    }

    /// MOV r64, imm32 (sign-extended)
    pub fn mov_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_rex_w_single(dst);
        self.buf.emit_u8(0xC7);
        self.buf.emit_u8(Self::modrm(0b11, 0, dst.code()));
        self.buf.emit_u32(imm as u32);
    }

    /// MOV r64, [base + disp]
    pub fn mov_rm(&mut self, dst: Reg, base: Reg, disp: i32) {
        self.emit_rex_w(dst, base);
        self.buf.emit_u8(0x8B);
        self.emit_mem_operand(dst.code(), base, disp);
    }

    /// MOV [base + disp], r64
    pub fn mov_mr(&mut self, base: Reg, disp: i32, src: Reg) {
        self.emit_rex_w(src, base);
        self.buf.emit_u8(0x89);
        self.emit_mem_operand(src.code(), base, disp);
    }

    /// MOVZX r64, r8
    pub fn movzx_r64_r8(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w(dst, src);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0xB6);
        self.buf.emit_u8(Self::modrm(0b11, dst.code(), src.code()));
    }

    // ==================== Arithmetic / Logic ====================

    pub fn add_rr(&mut self, dst: Reg, src: Reg) {
        self.alu_rr(Alu::Add, dst, src);
    }

    pub fn add_ri32(&mut self, dst: Reg, imm: i32) {
        self.alu_ri32(Alu::Add, dst, imm);
    }

    pub fn sub_rr(&mut self, dst: Reg, src: Reg) {
        self.alu_rr(Alu::Sub, dst, src);
    }

    pub fn sub_ri32(&mut self, dst: Reg, imm: i32) {
        self.alu_ri32(Alu::Sub, dst, imm);
    }

    pub fn or_rr(&mut self, dst: Reg, src: Reg) {
        self.alu_rr(Alu::Or, dst, src);
    }

    pub fn xor_rr(&mut self, dst: Reg, src: Reg) {
        self.alu_rr(Alu::Xor, dst, src);
    }

    pub fn xor_ri32(&mut self, dst: Reg, imm: i32) {
        self.alu_ri32(Alu::Xor, dst, imm);
    }

    pub fn cmp_rr(&mut self, dst: Reg, src: Reg) {
        self.alu_rr(Alu::Cmp, dst, src);
    }

    pub fn cmp_ri32(&mut self, dst: Reg, imm: i32) {
        self.alu_ri32(Alu::Cmp, dst, imm);
    }

    /// IMUL r64, r64 (result in first operand)
    pub fn imul_rr(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w(dst, src);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0xAF);
        self.buf.emit_u8(Self::modrm(0b11, dst.code(), src.code()));
    }

    /// NEG r64
    pub fn neg(&mut self, dst: Reg) {
        self.emit_rex_w_single(dst);
        self.buf.emit_u8(0xF7);
        self.buf.emit_u8(Self::modrm(0b11, 3, dst.code()));
    }

    /// TEST r64, r64
    pub fn test_rr(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w(src, dst);
        self.buf.emit_u8(0x85);
        self.buf.emit_u8(Self::modrm(0b11, src.code(), dst.code()));
    }

    /// SETcc r8
    pub fn setcc(&mut self, cond: Cond, dst: Reg) {
        if dst.needs_rex_ext() || matches!(dst, Reg::Rsp | Reg::Rbp | Reg::Rsi | Reg::Rdi) {
            // Without REX these encodings name AH/CH/DH/BH.
            self.buf.emit_u8(0x40 | dst.rex_b());
        }
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x90 + cond as u8);
        self.buf.emit_u8(Self::modrm(0b11, 0, dst.code()));
    }

    // ==================== Stack Operations ====================

    pub fn push(&mut self, reg: Reg) {
        if reg.needs_rex_ext() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x50 + reg.code());
    }

    pub fn pop(&mut self, reg: Reg) {
        if reg.needs_rex_ext() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x58 + reg.code());
    }

    // ==================== Control Flow ====================

    /// JMP rel32 with an unlinked displacement.
    pub fn jmp(&mut self) -> Jump {
        self.buf.emit_u8(0xE9);
        self.buf.emit_rel32_placeholder()
    }

    /// Jcc rel32 with an unlinked displacement.
    pub fn jcc(&mut self, cond: Cond) -> Jump {
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x80 + cond as u8);
        self.buf.emit_rel32_placeholder()
    }

    /// CALL r64
    pub fn call_r(&mut self, reg: Reg) {
        if reg.needs_rex_ext() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0xFF);
        self.buf.emit_u8(Self::modrm(0b11, 2, reg.code()));
    }

    pub fn ret(&mut self) {
        self.buf.emit_u8(0xC3);
    }
}
