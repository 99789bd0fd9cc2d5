//! x86-64 decoder for JIT diagnostics.
//!
//! Decodes the general-purpose integer subset the baseline compiler emits
//! (and a few common neighbours) into Intel-syntax text. Anything else is
//! printed one byte at a time as `.byte 0xNN`, so a range can always be
//! dumped completely.

use std::fmt::Write as _;
use std::io::{self, Write};

use super::link::CodeRange;

const REG64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];
const REG32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];
const REG8_REX: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];
const REG8_LEGACY: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const CONDITIONS: [&str; 16] = [
    "o", "no", "b", "ae", "e", "ne", "be", "a", "s", "ns", "p", "np", "l", "ge", "le", "g",
];
const GROUP1: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub len: usize,
    pub text: String,
}

/// Decode the instruction at the start of `bytes`, located at `address`.
///
/// Always consumes at least one byte when `bytes` is non-empty; bytes that
/// do not start a known instruction (or are truncated by the end of the
/// slice) decode as `.byte`.
pub fn decode(bytes: &[u8], address: usize) -> Option<Instruction> {
    let first = *bytes.first()?;
    let decoded = Decoder {
        bytes,
        pos: 0,
        rex: 0,
    }
    .decode(address);

    Some(decoded.unwrap_or_else(|| Instruction {
        len: 1,
        text: format!(".byte {:#04x}", first),
    }))
}

/// Write one line per instruction in `range`: `<prefix><address>: <text>`.
pub fn disassemble(range: &CodeRange<'_>, prefix: &str, out: &mut dyn Write) -> io::Result<()> {
    let base = range.start.address();
    let mut offset = 0;
    while let Some(inst) = decode(&range.bytes[offset..], base + offset) {
        writeln!(out, "{}{:#x}: {}", prefix, base + offset, inst.text)?;
        offset += inst.len;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Operand {
    Reg(usize),
    Mem {
        base: Option<usize>,
        index: Option<(usize, u8)>,
        disp: i32,
        rip: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    Dword,
    Qword,
}

impl Width {
    fn ptr(self) -> &'static str {
        match self {
            Width::Byte => "byte ptr ",
            Width::Dword => "dword ptr ",
            Width::Qword => "qword ptr ",
        }
    }

    fn reg(self, n: usize, has_rex: bool) -> &'static str {
        match self {
            Width::Qword => REG64[n],
            Width::Dword => REG32[n],
            Width::Byte if has_rex => REG8_REX[n],
            Width::Byte => REG8_LEGACY[n & 7],
        }
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    rex: u8,
}

impl Decoder<'_> {
    fn u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn i8(&mut self) -> Option<i8> {
        self.u8().map(|b| b as i8)
    }

    fn u32(&mut self) -> Option<u32> {
        let raw = self.bytes.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }

    fn u64(&mut self) -> Option<u64> {
        let raw = self.bytes.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        let mut le = [0u8; 8];
        le.copy_from_slice(raw);
        Some(u64::from_le_bytes(le))
    }

    fn has_rex(&self) -> bool {
        self.rex != 0
    }

    fn width(&self) -> Width {
        if self.rex & 0x08 != 0 { Width::Qword } else { Width::Dword }
    }

    fn rex_r(&self) -> usize {
        ((self.rex & 0x04) as usize) << 1
    }

    fn rex_x(&self) -> usize {
        ((self.rex & 0x02) as usize) << 2
    }

    fn rex_b(&self) -> usize {
        ((self.rex & 0x01) as usize) << 3
    }

    /// Parse ModR/M (+ SIB + displacement). Returns the reg field (extended
    /// by REX.R) and the r/m operand.
    fn modrm(&mut self) -> Option<(usize, Operand)> {
        let modrm = self.u8()?;
        let mode = modrm >> 6;
        let reg = ((modrm >> 3) & 7) as usize | self.rex_r();
        let rm = (modrm & 7) as usize;

        if mode == 0b11 {
            return Some((reg, Operand::Reg(rm | self.rex_b())));
        }

        let (mut base, mut index) = (Some(rm | self.rex_b()), None);
        let mut rip = false;
        let mut force_disp32 = false;

        if rm == 0b100 {
            let sib = self.u8()?;
            let scale = 1u8 << (sib >> 6);
            let idx = ((sib >> 3) & 7) as usize | self.rex_x();
            let sib_base = (sib & 7) as usize;
            if idx != 0b100 {
                index = Some((idx, scale));
            }
            base = Some(sib_base | self.rex_b());
            if sib_base == 0b101 && mode == 0b00 {
                base = None;
                force_disp32 = true;
            }
        } else if rm == 0b101 && mode == 0b00 {
            base = None;
            rip = true;
            force_disp32 = true;
        }

        let disp = match mode {
            0b01 => self.i8()? as i32,
            0b10 => self.i32()?,
            _ if force_disp32 => self.i32()?,
            _ => 0,
        };

        Some((
            reg,
            Operand::Mem {
                base,
                index,
                disp,
                rip,
            },
        ))
    }

    fn operand(&self, op: Operand, width: Width) -> String {
        match op {
            Operand::Reg(n) => width.reg(n, self.has_rex()).to_string(),
            Operand::Mem {
                base,
                index,
                disp,
                rip,
            } => {
                let mut s = String::from(width.ptr());
                s.push('[');
                let mut parts = Vec::new();
                if rip {
                    parts.push("rip".to_string());
                }
                if let Some(b) = base {
                    parts.push(REG64[b].to_string());
                }
                if let Some((i, scale)) = index {
                    parts.push(format!("{}*{}", REG64[i], scale));
                }
                s.push_str(&parts.join(" + "));
                if disp != 0 || parts.is_empty() {
                    if parts.is_empty() {
                        let _ = write!(s, "{:#x}", disp);
                    } else if disp < 0 {
                        let _ = write!(s, " - {:#x}", (disp as i64).unsigned_abs());
                    } else {
                        let _ = write!(s, " + {:#x}", disp);
                    }
                }
                s.push(']');
                s
            }
        }
    }

    fn decode(mut self, address: usize) -> Option<Instruction> {
        let mut op = self.u8()?;
        if (0x40..=0x4F).contains(&op) {
            self.rex = op;
            op = self.u8()?;
        }

        let text = match op {
            0x50..=0x57 => format!("push {}", REG64[(op - 0x50) as usize | self.rex_b()]),
            0x58..=0x5F => format!("pop {}", REG64[(op - 0x58) as usize | self.rex_b()]),

            // op r/m, reg
            0x01 | 0x09 | 0x21 | 0x29 | 0x31 | 0x39 | 0x85 | 0x89 => {
                let name = match op {
                    0x01 => "add",
                    0x09 => "or",
                    0x21 => "and",
                    0x29 => "sub",
                    0x31 => "xor",
                    0x39 => "cmp",
                    0x85 => "test",
                    _ => "mov",
                };
                let width = self.width();
                let (reg, rm) = self.modrm()?;
                format!(
                    "{} {}, {}",
                    name,
                    self.operand(rm, width),
                    width.reg(reg, self.has_rex())
                )
            }

            // mov reg, r/m
            0x8B => {
                let width = self.width();
                let (reg, rm) = self.modrm()?;
                format!("mov {}, {}", width.reg(reg, self.has_rex()), self.operand(rm, width))
            }

            0xB8..=0xBF => {
                let reg = (op - 0xB8) as usize | self.rex_b();
                if self.width() == Width::Qword {
                    format!("mov {}, {:#x}", REG64[reg], self.u64()?)
                } else {
                    format!("mov {}, {:#x}", REG32[reg], self.u32()?)
                }
            }

            0xC7 => {
                let width = self.width();
                let (ext, rm) = self.modrm()?;
                if ext & 7 != 0 {
                    return None;
                }
                let imm = self.i32()?;
                format!("mov {}, {}", self.operand(rm, width), signed_hex(imm as i64))
            }

            0x81 | 0x83 => {
                let width = self.width();
                let (ext, rm) = self.modrm()?;
                let imm = if op == 0x81 { self.i32()? } else { self.i8()? as i32 };
                format!(
                    "{} {}, {}",
                    GROUP1[ext & 7],
                    self.operand(rm, width),
                    signed_hex(imm as i64)
                )
            }

            0xF7 => {
                let width = self.width();
                let (ext, rm) = self.modrm()?;
                let target = self.operand(rm, width);
                match ext & 7 {
                    0 => format!("test {}, {}", target, signed_hex(self.i32()? as i64)),
                    2 => format!("not {}", target),
                    3 => format!("neg {}", target),
                    4 => format!("mul {}", target),
                    5 => format!("imul {}", target),
                    6 => format!("div {}", target),
                    7 => format!("idiv {}", target),
                    _ => return None,
                }
            }

            0x99 => {
                if self.width() == Width::Qword { "cqo".to_string() } else { "cdq".to_string() }
            }

            0x0F => {
                let op2 = self.u8()?;
                match op2 {
                    0x80..=0x8F => {
                        let rel = self.i32()?;
                        let target = branch_target(address, self.pos, rel as i64);
                        format!("j{} {:#x}", CONDITIONS[(op2 - 0x80) as usize], target)
                    }
                    0x90..=0x9F => {
                        let (_, rm) = self.modrm()?;
                        format!(
                            "set{} {}",
                            CONDITIONS[(op2 - 0x90) as usize],
                            self.operand(rm, Width::Byte)
                        )
                    }
                    0xAF => {
                        let width = self.width();
                        let (reg, rm) = self.modrm()?;
                        format!("imul {}, {}", width.reg(reg, self.has_rex()), self.operand(rm, width))
                    }
                    0xB6 => {
                        let width = self.width();
                        let (reg, rm) = self.modrm()?;
                        format!(
                            "movzx {}, {}",
                            width.reg(reg, self.has_rex()),
                            self.operand(rm, Width::Byte)
                        )
                    }
                    _ => return None,
                }
            }

            0x70..=0x7F => {
                let rel = self.i8()?;
                let target = branch_target(address, self.pos, rel as i64);
                format!("j{} {:#x}", CONDITIONS[(op - 0x70) as usize], target)
            }
            0xE8 | 0xE9 => {
                let rel = self.i32()?;
                let target = branch_target(address, self.pos, rel as i64);
                let name = if op == 0xE8 { "call" } else { "jmp" };
                format!("{} {:#x}", name, target)
            }
            0xEB => {
                let rel = self.i8()?;
                format!("jmp {:#x}", branch_target(address, self.pos, rel as i64))
            }

            0xFF => {
                let (ext, rm) = self.modrm()?;
                let target = self.operand(rm, Width::Qword);
                match ext & 7 {
                    0 => format!("inc {}", target),
                    1 => format!("dec {}", target),
                    2 => format!("call {}", target),
                    4 => format!("jmp {}", target),
                    6 => format!("push {}", target),
                    _ => return None,
                }
            }

            0xC3 => "ret".to_string(),
            0x90 => "nop".to_string(),
            0xCC => "int3".to_string(),
            _ => return None,
        };

        Some(Instruction {
            len: self.pos,
            text,
        })
    }
}

fn branch_target(address: usize, len: usize, rel: i64) -> u64 {
    (address as u64)
        .wrapping_add(len as u64)
        .wrapping_add(rel as u64)
}

fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{:#x}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::codebuf::CodeBuffer;
    use crate::jit::x86_64::{Cond, Reg, X86_64Assembler};

    fn text(bytes: &[u8]) -> String {
        decode(bytes, 0x1000).unwrap().text
    }

    fn assemble(f: impl FnOnce(&mut X86_64Assembler<'_>)) -> Vec<u8> {
        let mut buf = CodeBuffer::new();
        f(&mut X86_64Assembler::new(&mut buf));
        buf.into_code()
    }

    #[test]
    fn test_register_forms() {
        assert_eq!(text(&[0x48, 0x89, 0xC8]), "mov rax, rcx");
        assert_eq!(text(&[0x49, 0x89, 0xFC]), "mov r12, rdi");
        assert_eq!(text(&[0x41, 0x57]), "push r15");
        assert_eq!(text(&[0x5B]), "pop rbx");
        assert_eq!(text(&[0xC3]), "ret");
    }

    #[test]
    fn test_memory_forms() {
        assert_eq!(text(&[0x49, 0x8B, 0x45, 0xF0]), "mov rax, qword ptr [r13 - 0x10]");
        assert_eq!(text(&[0x49, 0x89, 0x45, 0x00]), "mov qword ptr [r13], rax");
        assert_eq!(
            text(&[0x49, 0x8B, 0x4C, 0x24, 0x08]),
            "mov rcx, qword ptr [r12 + 0x8]"
        );
    }

    #[test]
    fn test_immediates() {
        assert_eq!(text(&[0x49, 0x83, 0xC5, 0x10]), "add r13, 0x10");
        assert_eq!(text(&[0x49, 0x83, 0xED, 0x10]), "sub r13, 0x10");
        assert_eq!(text(&[0x48, 0x83, 0xF8, 0xFF]), "cmp rax, -0x1");
        let code = assemble(|a| a.mov_ri64(Reg::Rax, 0x7fff_0000_1234));
        assert_eq!(text(&code), "mov rax, 0x7fff00001234");
    }

    #[test]
    fn test_branch_targets() {
        // jo +0 at 0x1000 with length 6 targets 0x1006
        assert_eq!(text(&[0x0F, 0x80, 0, 0, 0, 0]), "jo 0x1006");
        // jmp -5 loops onto itself
        assert_eq!(text(&[0xE9, 0xFB, 0xFF, 0xFF, 0xFF]), "jmp 0x1000");
        assert_eq!(text(&[0xFF, 0xD0]), "call rax");
    }

    #[test]
    fn test_byte_registers() {
        let code = assemble(|a| {
            a.setcc(Cond::Ge, Reg::Rax);
        });
        assert_eq!(text(&code), "setge al");
        let code = assemble(|a| a.movzx_r64_r8(Reg::Rax, Reg::Rax));
        assert_eq!(text(&code), "movzx rax, al");
        let code = assemble(|a| a.setcc(Cond::E, Reg::Rsi));
        assert_eq!(text(&code), "sete sil");
    }

    #[test]
    fn test_unknown_and_truncated_bytes() {
        assert_eq!(text(&[0x06]), ".byte 0x06");
        // A truncated rel32 decodes the opcode byte alone.
        let inst = decode(&[0xE9, 0x00], 0).unwrap();
        assert_eq!(inst, Instruction { len: 1, text: ".byte 0xe9".to_string() });
        assert!(decode(&[], 0).is_none());
    }

    #[test]
    fn test_assembler_round_trip() {
        let code = assemble(|a| {
            a.push(Reg::Rbp);
            a.mov_rr(Reg::Rbp, Reg::Rsp);
            a.imul_rr(Reg::Rax, Reg::Rcx);
            a.neg(Reg::Rax);
            a.xor_ri32(Reg::Rax, 1);
            a.mov_ri32(Reg::Rdx, 3);
            a.call_r(Reg::Rax);
            a.ret();
        });

        let mut lines = Vec::new();
        let mut offset = 0;
        while let Some(inst) = decode(&code[offset..], offset) {
            lines.push(inst.text);
            offset += inst.len;
        }

        assert_eq!(
            lines,
            vec![
                "push rbp",
                "mov rbp, rsp",
                "imul rax, rcx",
                "neg rax",
                "xor rax, 0x1",
                "mov rdx, 0x3",
                "call rax",
                "ret",
            ]
        );
    }
}
