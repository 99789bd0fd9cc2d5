//! Baseline JIT compiler for x86-64.
//!
//! Each bytecode instruction is translated by a fixed template. Templates
//! only handle the common case inline (integer arithmetic without overflow,
//! boolean conditions); every check that can fail branches to a per-
//! instruction slow case. Slow cases are emitted after the whole main path,
//! call a runtime stub, and jump back to the next instruction, so the
//! finished code is laid out as
//!
//! ```text
//! prologue | main path (one template per instruction) | slow cases | epilogue
//! ```
//!
//! and the `JitDisassembler` built alongside it can attribute every byte.

use std::io;

use super::codebuf::{CodeBuffer, Jump, Label};
use super::disassembler::{DisassemblyLayout, JitDisassembler};
use super::link::LinkBuffer;
use super::stubs::{Stub, op_codes, tags};
use super::x86_64::{Cond, Reg, X86_64Assembler};
use super::JitError;
use crate::config::RuntimeConfig;
use crate::vm::{CodeBlock, Op, Verifier};

/// Register conventions.
///
/// Following System V AMD64 ABI:
/// - R12: VM context pointer (callee-saved)
/// - R13: value stack pointer, pointing at the next free slot (callee-saved)
/// - R14: locals base pointer (callee-saved)
/// - RAX, RCX, RDX, RSI, RDI: temporaries and stub arguments
pub mod regs {
    use super::Reg;

    pub const VM_CTX: Reg = Reg::R12;
    pub const VSTACK: Reg = Reg::R13;
    pub const LOCALS: Reg = Reg::R14;

    pub const TMP0: Reg = Reg::Rax;
    pub const TMP1: Reg = Reg::Rcx;
    pub const TMP2: Reg = Reg::Rdx;
}

use regs::{LOCALS, TMP0, TMP1, TMP2, VM_CTX, VSTACK};

/// Size of a value slot (tag + payload).
pub const VALUE_SIZE: i32 = 16;

/// Offsets from VSTACK of the top two values.
const TOP_TAG: i32 = -VALUE_SIZE;
const TOP_PAYLOAD: i32 = -VALUE_SIZE + 8;
const SECOND_TAG: i32 = -2 * VALUE_SIZE;
const SECOND_PAYLOAD: i32 = -2 * VALUE_SIZE + 8;

/// Callee-saved registers pushed by the prologue, in push order.
const SAVED_REGS: [Reg; 5] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// Compiled code for one code block.
#[derive(Debug)]
pub struct CompiledCode {
    pub link: LinkBuffer,
    /// Entry point offset within the code.
    pub entry_offset: usize,
    pub disassembler: JitDisassembler,
}

impl CompiledCode {
    /// Write the bytecode-annotated disassembly to `out`.
    pub fn dump_disassembly(&self, out: &mut dyn io::Write, code_block: &CodeBlock) -> io::Result<()> {
        self.disassembler.dump(out, code_block, &self.link)
    }

    pub fn layout(&self) -> DisassemblyLayout {
        self.disassembler.layout(&self.link)
    }
}

/// Baseline JIT compiler.
#[derive(Debug, Clone)]
pub struct JitCompiler {
    verifier: Verifier,
    base_address: Option<u64>,
    show_disassembly: bool,
}

impl JitCompiler {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            verifier: Verifier::with_max_stack(config.max_stack),
            base_address: config.base_address,
            show_disassembly: config.show_disassembly,
        }
    }

    /// Compile a code block to native code.
    pub fn compile(&self, block: &CodeBlock) -> Result<CompiledCode, JitError> {
        let max_height = self.verifier.verify(block).inspect_err(|e| {
            tracing::warn!(function = %block.name, error = %e, "verification failed");
        })?;
        tracing::debug!(
            function = %block.name,
            instructions = block.instruction_count(),
            max_height,
            "compiling"
        );

        let mut codegen = CodeGen::new(block);
        codegen.emit_function()?;
        let slow_cases = codegen.slow_cases.len();
        let (buf, disassembler) = codegen.finish();

        let link = match self.base_address {
            Some(base) => {
                let base = usize::try_from(base)
                    .ok()
                    .filter(|base| base.checked_add(buf.len()).is_some())
                    .ok_or_else(|| {
                        JitError::Unsupported(format!(
                            "base address {:#x} leaves no room for {} bytes of code",
                            base,
                            buf.len()
                        ))
                    })?;
                LinkBuffer::finalize_at(buf, base)
            }
            None => LinkBuffer::finalize(buf)?,
        };

        tracing::debug!(
            function = %block.name,
            code_size = link.debug_size(),
            slow_cases,
            address = %link.debug_address(),
            "compiled"
        );

        let compiled = CompiledCode {
            link,
            entry_offset: 0,
            disassembler,
        };

        if self.show_disassembly {
            compiled
                .disassembler
                .dump_to_data_file(block, &compiled.link)?;
        }

        Ok(compiled)
    }
}

/// What a slow case does once its checks have failed.
#[derive(Debug, Clone, Copy)]
enum SlowKind {
    /// Binary stub that pops one value and overwrites the other.
    Binary(Stub, u32),
    /// Unary stub that rewrites the top of stack.
    Unary(Stub),
    /// Truthiness test for a conditional branch.
    Branch { target: usize, jump_if: bool },
}

#[derive(Debug)]
struct SlowCase {
    index: usize,
    kind: SlowKind,
    jumps: Vec<Jump>,
}

/// Code generation state for a single code block.
struct CodeGen<'a> {
    block: &'a CodeBlock,
    buf: CodeBuffer,
    disassembler: JitDisassembler,
    /// Main-path label of every instruction, filled in by the main pass.
    main_labels: Vec<Label>,
    slow_cases: Vec<SlowCase>,
    /// Branches to bytecode targets (jump, target pc).
    branch_jumps: Vec<(Jump, usize)>,
    /// `ret` templates jumping to the shared epilogue.
    return_jumps: Vec<Jump>,
}

impl<'a> CodeGen<'a> {
    fn new(block: &'a CodeBlock) -> Self {
        let count = block.instruction_count();
        Self {
            block,
            buf: CodeBuffer::with_capacity(count * 32 + 64),
            disassembler: JitDisassembler::new(count),
            main_labels: Vec::with_capacity(count),
            slow_cases: Vec::new(),
            branch_jumps: Vec::new(),
            return_jumps: Vec::new(),
        }
    }

    fn asm(&mut self) -> X86_64Assembler<'_> {
        X86_64Assembler::new(&mut self.buf)
    }

    fn emit_function(&mut self) -> Result<(), JitError> {
        self.disassembler.set_start_of_code(self.buf.label());
        self.emit_prologue();

        let block = self.block;
        for (pc, op) in block.code.iter().enumerate() {
            let label = self.buf.label();
            self.main_labels.push(label);
            self.disassembler.set_for_bytecode_main_path(pc, label);
            self.compile_op(pc, *op)?;
        }

        self.disassembler.set_end_of_main_path(self.buf.label());
        for i in 0..self.slow_cases.len() {
            self.emit_slow_case(i);
        }
        self.disassembler.set_end_of_slow_path(self.buf.label());

        for jump in std::mem::take(&mut self.return_jumps) {
            self.buf.link_jump_here(jump);
        }
        self.emit_epilogue();
        self.disassembler.set_end_of_code(self.buf.label());

        for (jump, target) in std::mem::take(&mut self.branch_jumps) {
            self.buf.link_jump(jump, self.main_labels[target]);
        }

        Ok(())
    }

    fn finish(self) -> (CodeBuffer, JitDisassembler) {
        (self.buf, self.disassembler)
    }

    fn emit_prologue(&mut self) {
        let mut asm = self.asm();
        asm.push(Reg::Rbp);
        asm.mov_rr(Reg::Rbp, Reg::Rsp);
        for reg in SAVED_REGS {
            asm.push(reg);
        }
        // Keep RSP 16-byte aligned at stub calls.
        asm.sub_ri32(Reg::Rsp, 8);

        asm.mov_rr(VM_CTX, Reg::Rdi);
        asm.mov_rr(VSTACK, Reg::Rsi);
        asm.mov_rr(LOCALS, Reg::Rdx);
    }

    fn emit_epilogue(&mut self) {
        let mut asm = self.asm();
        asm.add_ri32(Reg::Rsp, 8);
        for reg in SAVED_REGS.iter().rev() {
            asm.pop(*reg);
        }
        asm.pop(Reg::Rbp);
        asm.ret();
    }

    fn add_slow_case(&mut self, index: usize, kind: SlowKind, jumps: Vec<Jump>) {
        self.slow_cases.push(SlowCase { index, kind, jumps });
    }

    fn local_offset(&self, pc: usize, slot: usize) -> Result<i32, JitError> {
        slot.checked_mul(VALUE_SIZE as usize)
            .and_then(|offset| i32::try_from(offset).ok())
            .filter(|offset| offset.checked_add(8).is_some())
            .ok_or_else(|| {
                JitError::Unsupported(format!("local slot {} at pc {} is not addressable", slot, pc))
            })
    }

    fn compile_op(&mut self, pc: usize, op: Op) -> Result<(), JitError> {
        match op {
            Op::PushInt(n) => self.emit_push_const(tags::TAG_INT, n),
            Op::PushTrue => self.emit_push_const(tags::TAG_BOOL, 1),
            Op::PushFalse => self.emit_push_const(tags::TAG_BOOL, 0),
            Op::PushNil => self.emit_push_const(tags::TAG_NIL, 0),
            Op::Pop => self.asm().sub_ri32(VSTACK, VALUE_SIZE),
            Op::Dup => {
                let mut asm = self.asm();
                asm.mov_rm(TMP0, VSTACK, TOP_TAG);
                asm.mov_rm(TMP1, VSTACK, TOP_PAYLOAD);
                Self::emit_push_pair(&mut asm);
            }
            Op::LoadLocal(slot) => {
                let offset = self.local_offset(pc, slot)?;
                let mut asm = self.asm();
                asm.mov_rm(TMP0, LOCALS, offset);
                asm.mov_rm(TMP1, LOCALS, offset + 8);
                Self::emit_push_pair(&mut asm);
            }
            Op::StoreLocal(slot) => {
                let offset = self.local_offset(pc, slot)?;
                let mut asm = self.asm();
                asm.mov_rm(TMP0, VSTACK, TOP_TAG);
                asm.mov_rm(TMP1, VSTACK, TOP_PAYLOAD);
                asm.mov_mr(LOCALS, offset, TMP0);
                asm.mov_mr(LOCALS, offset + 8, TMP1);
                asm.sub_ri32(VSTACK, VALUE_SIZE);
            }
            Op::Add => self.emit_int_arith(pc, op_codes::ADD),
            Op::Sub => self.emit_int_arith(pc, op_codes::SUB),
            Op::Mul => self.emit_int_arith(pc, op_codes::MUL),
            Op::Neg => {
                let mut asm = self.asm();
                asm.mov_rm(TMP0, VSTACK, TOP_TAG);
                asm.test_rr(TMP0, TMP0);
                let not_int = asm.jcc(Cond::Ne);
                asm.mov_rm(TMP0, VSTACK, TOP_PAYLOAD);
                asm.neg(TMP0);
                let overflow = asm.jcc(Cond::O);
                asm.mov_mr(VSTACK, TOP_PAYLOAD, TMP0);
                self.add_slow_case(pc, SlowKind::Unary(Stub::Negate), vec![not_int, overflow]);
            }
            Op::Not => {
                let mut asm = self.asm();
                asm.mov_rm(TMP0, VSTACK, TOP_TAG);
                asm.cmp_ri32(TMP0, tags::TAG_BOOL as i32);
                let not_bool = asm.jcc(Cond::Ne);
                asm.mov_rm(TMP0, VSTACK, TOP_PAYLOAD);
                asm.xor_ri32(TMP0, 1);
                asm.mov_mr(VSTACK, TOP_PAYLOAD, TMP0);
                self.add_slow_case(pc, SlowKind::Unary(Stub::Not), vec![not_bool]);
            }
            Op::Eq => self.emit_identity_compare(Cond::E),
            Op::Ne => self.emit_identity_compare(Cond::Ne),
            Op::Lt => self.emit_int_compare(pc, Cond::L, op_codes::LT),
            Op::Le => self.emit_int_compare(pc, Cond::Le, op_codes::LE),
            Op::Gt => self.emit_int_compare(pc, Cond::G, op_codes::GT),
            Op::Ge => self.emit_int_compare(pc, Cond::Ge, op_codes::GE),
            Op::Jmp(target) => {
                let jump = self.asm().jmp();
                self.branch_jumps.push((jump, target));
            }
            Op::JmpIfFalse(target) => self.emit_conditional_branch(pc, target, false),
            Op::JmpIfTrue(target) => self.emit_conditional_branch(pc, target, true),
            Op::Nop => {}
            Op::Ret => {
                let mut asm = self.asm();
                // Return value in RAX (tag) and RDX (payload).
                asm.mov_rm(Reg::Rax, VSTACK, TOP_TAG);
                asm.mov_rm(Reg::Rdx, VSTACK, TOP_PAYLOAD);
                asm.sub_ri32(VSTACK, VALUE_SIZE);
                let jump = asm.jmp();
                self.return_jumps.push(jump);
            }
        }
        Ok(())
    }

    fn emit_push_const(&mut self, tag: u64, payload: i64) {
        let mut asm = self.asm();
        asm.mov_ri32(TMP0, tag as i32);
        match i32::try_from(payload) {
            Ok(imm) => asm.mov_ri32(TMP1, imm),
            Err(_) => asm.mov_ri64(TMP1, payload),
        }
        Self::emit_push_pair(&mut asm);
    }

    /// Push TMP0 (tag) / TMP1 (payload).
    fn emit_push_pair(asm: &mut X86_64Assembler<'_>) {
        asm.mov_mr(VSTACK, 0, TMP0);
        asm.mov_mr(VSTACK, 8, TMP1);
        asm.add_ri32(VSTACK, VALUE_SIZE);
    }

    /// Branch to a slow case unless both operands are integers. TAG_INT is
    /// zero, so OR-ing the tags tests both at once.
    fn emit_both_int_check(asm: &mut X86_64Assembler<'_>) -> Jump {
        asm.mov_rm(TMP0, VSTACK, SECOND_TAG);
        asm.mov_rm(TMP1, VSTACK, TOP_TAG);
        asm.or_rr(TMP0, TMP1);
        asm.jcc(Cond::Ne)
    }

    fn emit_int_arith(&mut self, pc: usize, op: u32) {
        let mut asm = self.asm();
        let not_int = Self::emit_both_int_check(&mut asm);
        asm.mov_rm(TMP0, VSTACK, SECOND_PAYLOAD);
        asm.mov_rm(TMP1, VSTACK, TOP_PAYLOAD);
        match op {
            op_codes::ADD => asm.add_rr(TMP0, TMP1),
            op_codes::SUB => asm.sub_rr(TMP0, TMP1),
            _ => asm.imul_rr(TMP0, TMP1),
        }
        let overflow = asm.jcc(Cond::O);
        // The result tag is already TAG_INT.
        asm.mov_mr(VSTACK, SECOND_PAYLOAD, TMP0);
        asm.sub_ri32(VSTACK, VALUE_SIZE);
        self.add_slow_case(pc, SlowKind::Binary(Stub::Arith, op), vec![not_int, overflow]);
    }

    fn emit_int_compare(&mut self, pc: usize, cond: Cond, op: u32) {
        let mut asm = self.asm();
        let not_int = Self::emit_both_int_check(&mut asm);
        asm.mov_rm(TMP0, VSTACK, SECOND_PAYLOAD);
        asm.mov_rm(TMP1, VSTACK, TOP_PAYLOAD);
        asm.cmp_rr(TMP0, TMP1);
        Self::emit_store_bool(&mut asm, cond);
        self.add_slow_case(pc, SlowKind::Binary(Stub::Compare, op), vec![not_int]);
    }

    /// Bitwise equality of tag and payload. Never needs a slow case.
    fn emit_identity_compare(&mut self, cond: Cond) {
        let mut asm = self.asm();
        asm.mov_rm(TMP0, VSTACK, SECOND_TAG);
        asm.mov_rm(TMP1, VSTACK, TOP_TAG);
        asm.xor_rr(TMP0, TMP1);
        asm.mov_rm(TMP1, VSTACK, SECOND_PAYLOAD);
        asm.mov_rm(TMP2, VSTACK, TOP_PAYLOAD);
        asm.xor_rr(TMP1, TMP2);
        asm.or_rr(TMP0, TMP1);
        Self::emit_store_bool(&mut asm, cond);
    }

    /// Replace the top two values with a boolean from the current flags.
    fn emit_store_bool(asm: &mut X86_64Assembler<'_>, cond: Cond) {
        asm.setcc(cond, TMP0);
        asm.movzx_r64_r8(TMP0, TMP0);
        asm.mov_mr(VSTACK, SECOND_PAYLOAD, TMP0);
        asm.mov_ri32(TMP1, tags::TAG_BOOL as i32);
        asm.mov_mr(VSTACK, SECOND_TAG, TMP1);
        asm.sub_ri32(VSTACK, VALUE_SIZE);
    }

    fn emit_conditional_branch(&mut self, pc: usize, target: usize, jump_if: bool) {
        let mut asm = self.asm();
        asm.mov_rm(TMP0, VSTACK, TOP_TAG);
        asm.cmp_ri32(TMP0, tags::TAG_BOOL as i32);
        let not_bool = asm.jcc(Cond::Ne);
        asm.mov_rm(TMP0, VSTACK, TOP_PAYLOAD);
        asm.sub_ri32(VSTACK, VALUE_SIZE);
        asm.test_rr(TMP0, TMP0);
        let taken = asm.jcc(if jump_if { Cond::Ne } else { Cond::E });
        self.branch_jumps.push((taken, target));
        self.add_slow_case(pc, SlowKind::Branch { target, jump_if }, vec![not_bool]);
    }

    fn emit_slow_case(&mut self, i: usize) {
        let index = self.slow_cases[i].index;
        let kind = self.slow_cases[i].kind;
        let jumps = std::mem::take(&mut self.slow_cases[i].jumps);
        // Instructions with slow cases never end a verified function.
        let next = self.main_labels[index + 1];

        let label = self.buf.label();
        self.disassembler.set_for_bytecode_slow_path(index, label);

        let mut asm = self.asm();
        for jump in jumps {
            asm.link_jump_here(jump);
        }

        asm.mov_rr(Reg::Rdi, VM_CTX);
        asm.mov_rr(Reg::Rsi, VSTACK);
        let stub = match kind {
            SlowKind::Binary(stub, op) => {
                asm.mov_ri32(Reg::Rdx, op as i32);
                stub
            }
            SlowKind::Unary(stub) => stub,
            SlowKind::Branch { .. } => Stub::Truthy,
        };
        asm.mov_rm(TMP0, VM_CTX, stub.context_offset());
        asm.call_r(TMP0);

        match kind {
            SlowKind::Binary(..) | SlowKind::Unary(_) => {
                asm.mov_rr(VSTACK, Reg::Rax);
            }
            SlowKind::Branch { target, jump_if } => {
                asm.sub_ri32(VSTACK, VALUE_SIZE);
                asm.test_rr(Reg::Rax, Reg::Rax);
                let taken = asm.jcc(if jump_if { Cond::Ne } else { Cond::E });
                self.branch_jumps.push((taken, target));
            }
        }

        let mut asm = self.asm();
        let back = asm.jmp();
        asm.link_jump(back, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::disassembler::RegionKind;

    fn compiler() -> JitCompiler {
        JitCompiler::new(&RuntimeConfig {
            base_address: Some(0x10000),
            ..RuntimeConfig::default()
        })
    }

    fn compile(code: Vec<Op>, locals: usize) -> (CodeBlock, CompiledCode) {
        let block = CodeBlock::new("test", locals, code);
        let compiled = compiler().compile(&block).unwrap();
        (block, compiled)
    }

    #[test]
    fn test_every_instruction_has_a_main_region() {
        let (block, compiled) = compile(
            vec![Op::PushInt(1), Op::PushInt(2), Op::Add, Op::Ret],
            0,
        );
        let layout = compiled.layout();

        let indices: Vec<_> = layout.main_path.iter().map(|r| r.bytecode_index).collect();
        assert_eq!(indices, (0..block.code.len()).map(Some).collect::<Vec<_>>());
        assert_eq!(layout.prologue.start.address(), 0x10000);
        assert!(!layout.prologue.is_empty());
        assert!(!layout.epilogue.is_empty());
    }

    #[test]
    fn test_slow_cases_follow_instruction_order() {
        let (_, compiled) = compile(
            vec![
                Op::PushInt(1),
                Op::PushInt(2),
                Op::Lt,
                Op::JmpIfFalse(7),
                Op::PushInt(3),
                Op::Neg,
                Op::Ret,
                Op::PushNil,
                Op::Ret,
            ],
            0,
        );
        let layout = compiled.layout();

        let slow: Vec<_> = layout
            .slow_path
            .iter()
            .map(|r| (r.kind, r.bytecode_index))
            .collect();
        assert_eq!(
            slow,
            vec![
                (RegionKind::SlowPath, Some(2)),
                (RegionKind::SlowPath, Some(3)),
                (RegionKind::SlowPath, Some(5)),
            ]
        );
        // The last main region ends where the slow path starts.
        assert_eq!(layout.main_path.last().unwrap().end, layout.slow_path[0].start);
    }

    #[test]
    fn test_nop_has_empty_region() {
        let (_, compiled) = compile(vec![Op::Nop, Op::PushNil, Op::Ret], 0);
        let layout = compiled.layout();

        assert!(layout.main_path[0].is_empty());
        assert!(layout.slow_path.is_empty());
    }

    #[test]
    fn test_regions_cover_the_code() {
        let (_, compiled) = compile(
            vec![
                Op::PushInt(0),
                Op::StoreLocal(0),
                Op::LoadLocal(0),
                Op::PushInt(10),
                Op::Lt,
                Op::JmpIfFalse(11),
                Op::LoadLocal(0),
                Op::PushInt(1),
                Op::Add,
                Op::StoreLocal(0),
                Op::Jmp(2),
                Op::LoadLocal(0),
                Op::Ret,
            ],
            1,
        );
        let layout = compiled.layout();

        let mut cursor = layout.code_start.address();
        for region in layout.regions() {
            assert_eq!(region.start.address(), cursor);
            cursor = region.end.address();
        }
        assert_eq!(cursor, layout.code_start.address() + layout.code_size);
    }

    #[test]
    fn test_dump_mentions_every_instruction() {
        let (block, compiled) = compile(vec![Op::PushTrue, Op::Not, Op::Ret], 0);
        let mut out = Vec::new();
        compiled.dump_disassembly(&mut out, &block).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Baseline JIT code for CodeBlock test, instruction count = 3\n"));
        assert!(text.contains("    [   0] push_true\n"));
        assert!(text.contains("    [   1] not\n"));
        assert!(text.contains("    (S) [   1] not\n"));
        assert!(text.contains("        0x10000: push rbp\n"));
        assert!(!text.contains(".byte"));
    }

    #[test]
    fn test_verification_failure() {
        let block = CodeBlock::new("bad", 0, vec![Op::Add, Op::Ret]);
        let err = compiler().compile(&block).unwrap_err();
        assert!(matches!(err, JitError::Verify(_)));
    }

    #[test]
    fn test_base_address_without_room_for_code() {
        let block = CodeBlock::new("high", 0, vec![Op::PushNil, Op::Ret]);
        let config = RuntimeConfig {
            base_address: Some(u64::MAX - 4),
            ..RuntimeConfig::default()
        };
        let err = JitCompiler::new(&config).compile(&block).unwrap_err();
        assert!(matches!(err, JitError::Unsupported(_)));
        assert!(err.to_string().contains("leaves no room"), "{}", err);
    }

    #[test]
    fn test_verifier_is_cloned_with_compiler() {
        let config = RuntimeConfig {
            max_stack: 1,
            ..RuntimeConfig::default()
        };
        let compiler = JitCompiler::new(&config).clone();
        let block = CodeBlock::new("deep", 0, vec![Op::PushNil, Op::PushNil, Op::Pop, Op::Ret]);
        assert!(matches!(compiler.compile(&block), Err(JitError::Verify(_))));
        assert!(format!("{:?}", compiler).contains("max_stack: 1"));
    }

    #[test]
    fn test_finalize_into_executable_memory() {
        let block = CodeBlock::new("exec", 0, vec![Op::PushNil, Op::Ret]);
        let compiled = JitCompiler::new(&RuntimeConfig::default())
            .compile(&block)
            .unwrap();
        assert!(compiled.link.is_executable());
        assert_eq!(compiled.layout().main_path.len(), 2);
    }
}
