//! Baseline JIT and its diagnostic disassembly.
//!
//! - Executable memory allocation and the code/link buffers
//! - x86-64 instruction encoding and decoding
//! - Template-based baseline compiler with slow-path stubs
//! - Bytecode-annotated disassembly dumps

pub mod codebuf;
pub mod compiler;
pub mod data_log;
pub mod disassembler;
pub mod link;
pub mod memory;
pub mod stubs;
pub mod x86_64;
pub mod x86_64_disasm;

use std::io;

use crate::vm::VerifyError;
pub use compiler::{CompiledCode, JitCompiler};
pub use disassembler::{DisassemblyLayout, JitDisassembler, Region, RegionKind};
pub use link::{CodeLocation, LinkBuffer};
pub use memory::MemoryError;

#[derive(Debug, thiserror::Error)]
pub enum JitError {
    #[error("bytecode verification failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("executable memory: {0}")]
    Memory(#[from] MemoryError),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("failed to write disassembly: {0}")]
    Dump(#[from] io::Error),
}
