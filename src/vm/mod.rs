mod ops;
pub mod dump;
pub mod program;
pub mod verifier;

pub use ops::{Op, ParseOpError};
pub use program::{Program, ProgramError};
pub use verifier::{Verifier, VerifyError};

/// A unit of bytecode handed to the JIT: one function.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub name: String,
    pub arity: usize,
    pub locals_count: usize,
    pub code: Vec<Op>,
}

impl CodeBlock {
    pub fn new(name: impl Into<String>, locals_count: usize, code: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            locals_count,
            code,
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.code.len()
    }
}

/// Renders individual bytecode instructions for diagnostic dumps.
pub trait InstructionFormatter {
    /// Name used in dump headers.
    fn name(&self) -> &str;

    fn instruction_count(&self) -> usize;

    /// One-line rendering of instruction `index`.
    ///
    /// Panics if `index` is out of range.
    fn format_instruction(&self, index: usize) -> String;
}

impl InstructionFormatter for CodeBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn instruction_count(&self) -> usize {
        self.code.len()
    }

    fn format_instruction(&self, index: usize) -> String {
        assert!(
            index < self.code.len(),
            "instruction index {} out of range for code block '{}' ({} instructions)",
            index,
            self.name,
            self.code.len()
        );
        format!("[{:4}] {}", index, self.code[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_instruction() {
        let block = CodeBlock::new("f", 1, vec![Op::PushInt(3), Op::StoreLocal(0), Op::Ret]);
        assert_eq!(block.format_instruction(0), "[   0] push_int 3");
        assert_eq!(block.format_instruction(2), "[   2] ret");
        assert_eq!(InstructionFormatter::instruction_count(&block), 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_format_instruction_out_of_range() {
        let block = CodeBlock::new("f", 0, vec![Op::Ret]);
        block.format_instruction(1);
    }
}
