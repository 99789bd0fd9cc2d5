//! Code buffer for building JIT code.
//!
//! Machine code is assembled here before `LinkBuffer` copies it to its
//! final location. Positions in the buffer are handed out as `Label`s;
//! forward branches are emitted as `Jump` placeholders and patched once
//! their target label exists.

/// A position in not-yet-finalized machine code.
///
/// A label is only an offset into the buffer that produced it; turning it
/// into an address requires the finalized `LinkBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u32);

impl Label {
    /// Byte offset from the start of the code buffer.
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    /// Label at a known offset. Used when building label tables by hand.
    pub fn from_offset(offset: usize) -> Self {
        Label(u32::try_from(offset).expect("code buffer exceeds 4 GiB"))
    }
}

/// An emitted branch whose 32-bit relative displacement still has to be
/// linked to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an unlinked jump branches to the next instruction"]
pub struct Jump {
    /// Offset of the rel32 field. The displacement is relative to the end
    /// of that field.
    field: usize,
}

impl Jump {
    pub(crate) fn new(field: usize) -> Self {
        Self { field }
    }
}

/// A buffer for building machine code.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Label for the current end of the buffer.
    pub fn label(&self) -> Label {
        Label::from_offset(self.code.len())
    }

    pub fn emit_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Emit a 32-bit value (little-endian).
    pub fn emit_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit value (little-endian).
    pub fn emit_u64(&mut self, value: u64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Emit a zeroed rel32 field and return it as an unlinked jump.
    pub fn emit_rel32_placeholder(&mut self) -> Jump {
        let jump = Jump::new(self.code.len());
        self.emit_u32(0);
        jump
    }

    /// Point `jump` at `target`.
    pub fn link_jump(&mut self, jump: Jump, target: Label) {
        let field = jump.field;
        assert!(field + 4 <= self.code.len(), "jump field outside the code buffer");
        assert!(target.offset() <= self.code.len(), "jump target outside the code buffer");

        let rel = target.offset() as i64 - (field as i64 + 4);
        let rel = i32::try_from(rel).expect("jump displacement exceeds rel32");
        self.code[field..field + 4].copy_from_slice(&rel.to_le_bytes());
    }

    /// Point `jump` at the current end of the buffer.
    pub fn link_jump_here(&mut self, jump: Jump) {
        let here = self.label();
        self.link_jump(jump, here);
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_bytes() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0x90);
        buf.emit_u32(0xDEADBEEF);
        buf.emit_u64(1);

        assert_eq!(buf.len(), 13);
        assert_eq!(&buf.code()[..5], &[0x90, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_labels_are_offsets() {
        let mut buf = CodeBuffer::new();
        let start = buf.label();
        buf.emit_u8(0x90);
        let after = buf.label();

        assert_eq!(start.offset(), 0);
        assert_eq!(after.offset(), 1);
        assert!(start < after);
    }

    #[test]
    fn test_link_forward_jump() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0xE9);
        let jump = buf.emit_rel32_placeholder();
        buf.emit_bytes(&[0x90, 0x90]);
        buf.link_jump_here(jump);

        // Displacement is measured from the end of the rel32 field (offset 5).
        assert_eq!(&buf.code()[1..5], &2i32.to_le_bytes());
    }

    #[test]
    fn test_link_backward_jump() {
        let mut buf = CodeBuffer::new();
        let top = buf.label();
        buf.emit_u8(0x90);
        buf.emit_u8(0xE9);
        let jump = buf.emit_rel32_placeholder();
        buf.link_jump(jump, top);

        assert_eq!(&buf.code()[2..6], &(-6i32).to_le_bytes());
    }
}
