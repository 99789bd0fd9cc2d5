//! Bytecode verifier.
//!
//! Run before JIT compilation so that generated code can index locals and
//! the value stack without runtime bounds checks:
//! - Control Flow: jump targets must be instruction boundaries
//! - Locals: slot operands must be below `locals_count`
//! - Stack Height Consistency: each basic block has a unique entry stack height
//! - Stack Effect Validation: no underflow/overflow

use std::collections::{HashMap, HashSet, VecDeque};

use super::CodeBlock;
use super::ops::Op;

/// Verification error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid jump target at pc={pc}: target={target} is out of bounds")]
    InvalidJumpTarget { pc: usize, target: usize },
    #[error("invalid local slot at pc={pc}: slot {slot} but only {locals} locals")]
    InvalidLocal { pc: usize, slot: usize, locals: usize },
    #[error("stack height mismatch at pc={pc}: expected {expected}, got {actual}")]
    StackHeightMismatch {
        pc: usize,
        expected: usize,
        actual: usize,
    },
    #[error("stack underflow at pc={pc}: requires {required} values, but only {actual} on stack")]
    StackUnderflow {
        pc: usize,
        required: usize,
        actual: usize,
    },
    #[error("stack overflow at pc={pc}: height {height} exceeds max_stack {max}")]
    StackOverflow { pc: usize, height: usize, max: usize },
    #[error("empty function")]
    EmptyFunction,
    #[error("control falls off the end of the function")]
    MissingReturn,
}

/// A basic block in the control flow graph
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Start PC (inclusive)
    pub start: usize,
    /// End PC (exclusive)
    pub end: usize,
    pub successors: Vec<usize>,
}

/// Control flow graph
#[derive(Debug)]
#[allow(clippy::upper_case_acronyms)]
pub struct CFG {
    pub blocks: Vec<BasicBlock>,
    pub pc_to_block: HashMap<usize, usize>,
}

/// Bytecode verifier
#[derive(Debug, Clone)]
pub struct Verifier {
    /// Maximum stack size (configurable, default 1024)
    pub max_stack: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self { max_stack: 1024 }
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_stack(max_stack: usize) -> Self {
        Self { max_stack }
    }

    /// Verify a code block.
    ///
    /// On success returns the maximum stack height reached.
    pub fn verify(&self, block: &CodeBlock) -> Result<usize, VerifyError> {
        if block.code.is_empty() {
            return Err(VerifyError::EmptyFunction);
        }

        self.verify_locals(block)?;
        let cfg = self.build_cfg(block)?;
        self.verify_stack_heights(block, &cfg)
    }

    fn verify_locals(&self, block: &CodeBlock) -> Result<(), VerifyError> {
        for (pc, op) in block.code.iter().enumerate() {
            if let Op::LoadLocal(slot) | Op::StoreLocal(slot) = op {
                if *slot >= block.locals_count {
                    return Err(VerifyError::InvalidLocal {
                        pc,
                        slot: *slot,
                        locals: block.locals_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// Build control flow graph from the bytecode
    pub fn build_cfg(&self, block: &CodeBlock) -> Result<CFG, VerifyError> {
        let code = &block.code;
        let len = code.len();

        let mut leaders: HashSet<usize> = HashSet::new();
        leaders.insert(0);

        for (pc, op) in code.iter().enumerate() {
            match op {
                Op::Jmp(target) | Op::JmpIfTrue(target) | Op::JmpIfFalse(target) => {
                    if *target >= len {
                        return Err(VerifyError::InvalidJumpTarget {
                            pc,
                            target: *target,
                        });
                    }
                    leaders.insert(*target);
                    if pc + 1 < len {
                        leaders.insert(pc + 1);
                    }
                }
                Op::Ret => {
                    if pc + 1 < len {
                        leaders.insert(pc + 1);
                    }
                }
                _ => {}
            }
        }

        let mut sorted_leaders: Vec<usize> = leaders.into_iter().collect();
        sorted_leaders.sort_unstable();

        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut pc_to_block: HashMap<usize, usize> = HashMap::new();

        for (i, &start) in sorted_leaders.iter().enumerate() {
            let end = sorted_leaders.get(i + 1).copied().unwrap_or(len);
            let block_idx = blocks.len();
            for pc in start..end {
                pc_to_block.insert(pc, block_idx);
            }
            blocks.push(BasicBlock {
                start,
                end,
                successors: Vec::new(),
            });
        }

        for block in &mut blocks {
            let last_op = &code[block.end - 1];
            let mut successors = Vec::new();

            match last_op {
                Op::Jmp(target) => {
                    if let Some(&succ) = pc_to_block.get(target) {
                        successors.push(succ);
                    }
                }
                Op::JmpIfTrue(target) | Op::JmpIfFalse(target) => {
                    if let Some(&succ) = pc_to_block.get(target) {
                        successors.push(succ);
                    }
                    if block.end >= len {
                        return Err(VerifyError::MissingReturn);
                    }
                    if let Some(&succ) = pc_to_block.get(&block.end) {
                        if !successors.contains(&succ) {
                            successors.push(succ);
                        }
                    }
                }
                Op::Ret => {}
                _ => {
                    // Fall-through; the last block must end in a terminator.
                    if block.end >= len {
                        return Err(VerifyError::MissingReturn);
                    }
                    if let Some(&succ) = pc_to_block.get(&block.end) {
                        successors.push(succ);
                    }
                }
            }

            block.successors = successors;
        }

        Ok(CFG {
            blocks,
            pc_to_block,
        })
    }

    /// Verify stack heights using abstract interpretation.
    ///
    /// Returns the maximum height reached on any path.
    pub fn verify_stack_heights(&self, block: &CodeBlock, cfg: &CFG) -> Result<usize, VerifyError> {
        let code = &block.code;
        let mut block_heights: Vec<Option<usize>> = vec![None; cfg.blocks.len()];
        let mut worklist: VecDeque<usize> = VecDeque::new();
        let mut max_height = 0;

        block_heights[0] = Some(0);
        worklist.push_back(0);

        while let Some(block_idx) = worklist.pop_front() {
            let bb = &cfg.blocks[block_idx];
            let Some(mut height) = block_heights[block_idx] else {
                continue;
            };

            for (pc, op) in code.iter().enumerate().take(bb.end).skip(bb.start) {
                let (pops, pushes) = stack_effect(op);
                if height < pops {
                    return Err(VerifyError::StackUnderflow {
                        pc,
                        required: pops,
                        actual: height,
                    });
                }
                height = height - pops + pushes;
                if height > self.max_stack {
                    return Err(VerifyError::StackOverflow {
                        pc,
                        height,
                        max: self.max_stack,
                    });
                }
                max_height = max_height.max(height);
            }

            for &succ_idx in &bb.successors {
                match block_heights[succ_idx] {
                    None => {
                        block_heights[succ_idx] = Some(height);
                        worklist.push_back(succ_idx);
                    }
                    Some(existing) if existing != height => {
                        return Err(VerifyError::StackHeightMismatch {
                            pc: cfg.blocks[succ_idx].start,
                            expected: existing,
                            actual: height,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(max_height)
    }
}

/// Stack effect of an operation: (pops, pushes)
fn stack_effect(op: &Op) -> (usize, usize) {
    match op {
        Op::PushInt(_) | Op::PushTrue | Op::PushFalse | Op::PushNil => (0, 1),
        Op::Pop => (1, 0),
        Op::Dup => (1, 2),
        Op::LoadLocal(_) => (0, 1),
        Op::StoreLocal(_) => (1, 0),
        Op::Add | Op::Sub | Op::Mul => (2, 1),
        Op::Neg | Op::Not => (1, 1),
        Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => (2, 1),
        Op::Jmp(_) | Op::Nop => (0, 0),
        Op::JmpIfTrue(_) | Op::JmpIfFalse(_) => (1, 0),
        Op::Ret => (1, 0),
    }
}
