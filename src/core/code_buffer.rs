// This module provides CodeBuffer, the append-only byte sequence that holds machine code
// while it is being generated. Bytes are appended one at a time, as fixed sequences, or as
// little-endian 32/64-bit immediates, and previously emitted bytes can be overwritten at a
// recorded offset once a forward branch target becomes known. Overwriting past the current
// end is a programming error and panics. The finished buffer is handed to the executable
// memory manager as an immutable snapshot.

//! Append-only, patchable machine code buffer.

/// Machine code under construction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeBuffer {
    code: Vec<u8>,
}

impl CodeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single byte.
    pub fn emit_u8(&mut self, v: u8) {
        self.code.push(v);
    }

    /// Append a sequence of bytes (instructions are usually longer than one byte).
    pub fn emit_bytes(&mut self, seq: &[u8]) {
        self.code.extend_from_slice(seq);
    }

    /// Append a 32-bit value in little-endian order.
    pub fn emit_u32(&mut self, v: u32) {
        self.emit_bytes(&v.to_le_bytes());
    }

    /// Append a 64-bit value in little-endian order.
    pub fn emit_u64(&mut self, v: u64) {
        self.emit_bytes(&v.to_le_bytes());
    }

    /// Replace the byte at `offset` with `v`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not inside the buffer.
    pub fn patch_u8(&mut self, offset: usize, v: u8) {
        assert!(
            offset < self.code.len(),
            "patch offset {offset} outside code of length {}",
            self.code.len()
        );
        self.code[offset] = v;
    }

    /// Replace the 32-bit little-endian field starting at `offset` with `v`.
    ///
    /// # Panics
    ///
    /// Panics if any byte of the field is not inside the buffer.
    pub fn patch_u32(&mut self, offset: usize, v: u32) {
        for (i, byte) in v.to_le_bytes().into_iter().enumerate() {
            self.patch_u8(offset + i, byte);
        }
    }

    /// Read back the 32-bit little-endian field at `offset`.
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let field = self.code.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
    }

    /// Current code size.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// View of the code emitted so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.code
    }

    /// Consume the buffer, producing the immutable snapshot that gets loaded.
    pub fn into_snapshot(self) -> Box<[u8]> {
        self.code.into_boxed_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::CodeBuffer;

    #[test]
    fn test_little_endian_immediates() {
        let mut buf = CodeBuffer::new();
        buf.emit_bytes(&[0x49, 0xBD]);
        buf.emit_u64(0x1122_3344_5566_7788);
        buf.emit_u32(0xDEAD_BEEF);

        assert_eq!(buf.len(), 14);
        assert_eq!(
            buf.as_slice(),
            &[
                0x49, 0xBD, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0xEF, 0xBE, 0xAD,
                0xDE
            ]
        );
    }

    #[test]
    fn test_patch_in_place() {
        let mut buf = CodeBuffer::new();
        buf.emit_bytes(&[0x0F, 0x84]);
        buf.emit_u32(0);
        buf.emit_u8(0xC3);

        buf.patch_u32(2, 0xFFFF_FFF5);
        assert_eq!(buf.read_u32(2), Some(0xFFFF_FFF5));
        assert_eq!(buf.as_slice()[6], 0xC3);

        buf.patch_u8(6, 0x90);
        assert_eq!(buf.into_snapshot().last(), Some(&0x90));
    }

    #[test]
    #[should_panic(expected = "outside code")]
    fn test_patch_past_end_panics() {
        let mut buf = CodeBuffer::new();
        buf.emit_bytes(&[0x0F, 0x84, 0x00, 0x00]);
        buf.patch_u32(2, 1);
    }

    #[test]
    fn test_read_u32_out_of_range() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0);
        assert_eq!(buf.read_u32(0), None);
        assert_eq!(buf.read_u32(usize::MAX), None);
    }
}
