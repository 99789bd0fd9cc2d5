//! Bytecode listing for `jitdump bytecode`.

use super::{CodeBlock, Program};

/// Disassembler for bytecode.
pub struct Disassembler<'a> {
    program: &'a Program,
    output: String,
}

impl<'a> Disassembler<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            output: String::new(),
        }
    }

    pub fn disassemble(&mut self) -> &str {
        for (i, block) in self.program.functions.iter().enumerate() {
            if i > 0 {
                self.output.push('\n');
            }
            self.disassemble_block(block, i);
        }

        &self.output
    }

    fn disassemble_block(&mut self, block: &CodeBlock, index: usize) {
        self.output.push_str(&format!(
            "== Function[{}]: {} (arity: {}, locals: {}) ==\n",
            index, block.name, block.arity, block.locals_count
        ));
        for (pc, op) in block.code.iter().enumerate() {
            self.output.push_str(&format!("{:04}: {}", pc, op));
            if let Some(target) = op.jump_target() {
                if target <= pc {
                    self.output.push_str(" ; loop");
                }
            }
            self.output.push('\n');
        }
    }
}

/// Format a program as a disassembled bytecode string.
pub fn format_bytecode(program: &Program) -> String {
    let mut disassembler = Disassembler::new(program);
    disassembler.disassemble().to_string()
}
