//! jitdump - a baseline JIT with bytecode-annotated disassembly dumps
//!
//! Bytecode code blocks (`vm`) are compiled to x86-64 by a template JIT
//! (`jit`), which records where each instruction's main-path and slow-path
//! code begins. `jit::JitDisassembler` turns those labels back into a dump
//! that shows every instruction next to the machine code it produced.

pub mod config;
pub mod jit;
pub mod logging;
pub mod vm;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use jit::{CompiledCode, JitCompiler, JitDisassembler, LinkBuffer};
pub use vm::{CodeBlock, InstructionFormatter, Op, Program};
