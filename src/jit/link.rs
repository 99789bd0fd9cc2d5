//! Finalized machine code.
//!
//! A `LinkBuffer` is the only way to turn a `Label` into an address: it is
//! created by finalizing a `CodeBuffer`, after which the code no longer
//! changes and every label offset has a fixed location.

use std::fmt;

use serde::Serialize;

use super::codebuf::{CodeBuffer, Label};
use super::memory::{ExecutableMemory, MemoryError};

/// Address of a byte of finalized code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CodeLocation(usize);

impl CodeLocation {
    pub fn address(self) -> usize {
        self.0
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A contiguous slice of finalized code and where it lives.
#[derive(Debug, Clone, Copy)]
pub struct CodeRange<'a> {
    pub start: CodeLocation,
    pub bytes: &'a [u8],
}

impl CodeRange<'_> {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last byte.
    pub fn end(&self) -> CodeLocation {
        CodeLocation(self.start.0 + self.bytes.len())
    }
}

enum Storage {
    Executable(ExecutableMemory),
    Detached(Vec<u8>),
}

/// Finalized code plus the address it is reported at.
pub struct LinkBuffer {
    storage: Storage,
    base: usize,
    size: usize,
}

impl LinkBuffer {
    /// Copy the code into freshly mapped executable memory.
    pub fn finalize(buf: CodeBuffer) -> Result<Self, MemoryError> {
        let code = buf.into_code();
        let mut memory = ExecutableMemory::new(code.len())?;
        memory.write(0, &code)?;
        memory.make_executable()?;

        Ok(Self {
            base: memory.address(),
            size: code.len(),
            storage: Storage::Executable(memory),
        })
    }

    /// Keep the code in ordinary memory and report it as if it had been
    /// placed at `base`. The bytes are never executed; this is what makes
    /// dumps reproducible.
    pub fn finalize_at(buf: CodeBuffer, base: usize) -> Self {
        let code = buf.into_code();
        Self {
            base,
            size: code.len(),
            storage: Storage::Detached(code),
        }
    }

    /// Address of the first byte of code.
    pub fn debug_address(&self) -> CodeLocation {
        CodeLocation(self.base)
    }

    /// Number of bytes of code (excluding page padding).
    pub fn debug_size(&self) -> usize {
        self.size
    }

    /// One past the last byte of code.
    pub fn debug_end(&self) -> CodeLocation {
        CodeLocation(self.base + self.size)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.storage, Storage::Executable(_))
    }

    pub fn code(&self) -> &[u8] {
        match &self.storage {
            Storage::Executable(memory) => &memory.as_slice()[..self.size],
            Storage::Detached(code) => code,
        }
    }

    /// Resolve a label produced by the finalized buffer.
    ///
    /// # Panics
    ///
    /// If the label lies beyond the end of the code.
    pub fn location_of(&self, label: Label) -> CodeLocation {
        assert!(
            label.offset() <= self.size,
            "label at offset {} is outside finalized code of {} bytes",
            label.offset(),
            self.size
        );
        CodeLocation(self.base + label.offset())
    }

    /// The bytes of `[from, to)`. Empty when `from >= to`.
    ///
    /// # Panics
    ///
    /// If a non-empty range reaches outside the code.
    pub fn code_range(&self, from: CodeLocation, to: CodeLocation) -> CodeRange<'_> {
        if from >= to {
            return CodeRange {
                start: from,
                bytes: &[],
            };
        }

        let end = self.base + self.size;
        assert!(
            from.0 >= self.base && to.0 <= end,
            "range [{}, {}) is outside finalized code [{:#x}, {:#x})",
            from,
            to,
            self.base,
            end
        );

        let code = self.code();
        CodeRange {
            start: from,
            bytes: &code[from.0 - self.base..to.0 - self.base],
        }
    }
}

impl fmt::Debug for LinkBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkBuffer")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.size)
            .field("executable", &self.is_executable())
            .finish()
    }
}
