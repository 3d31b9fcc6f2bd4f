//! Bounded output buffer the machine code is written into.



use crate::state::CellWidth;



/// Fixed-capacity byte sink over a caller-owned region.
///
/// Appends advance a cursor that never passes the end of the region.
/// An append that does not fit sets the failure flag and writes nothing,
/// and every append after that is a no-op.
#[derive(Debug)]
pub struct OutputSink<'a> {
    buffer: &'a mut [u8],
    pos: usize,
    failed: bool,
}

impl<'a> OutputSink<'a> {
    /// Create a sink writing from the start of `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            pos: 0,
            failed: false,
        }
    }

    /// Offset of the next byte to be written.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Total size of the region.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Whether any write has been rejected.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The bytes written so far.
    pub fn code(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }

    /// Append `bytes` at the cursor.
    pub fn put(&mut self, bytes: &[u8]) {
        if self.failed {
            return;
        }
        let end = self.pos + bytes.len();
        if end > self.buffer.len() {
            self.failed = true;
            return;
        }
        self.buffer[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    /// Append `value` truncated to the width of a cell.
    pub fn put_imm(&mut self, width: CellWidth, value: u32) {
        match width {
            CellWidth::Byte => self.put(&[value as u8]),
            CellWidth::Word => self.put_u16(value as u16),
            CellWidth::Dword => self.put_u32(value),
        }
    }

    /// Append a 32-bit displacement from the end of the field to `target`.
    pub fn put_relative(&mut self, target: usize) {
        let displacement = target as i64 - self.pos as i64 - 4;
        self.put_u32(displacement as i32 as u32);
    }

    /// Append a 32-bit displacement to an absolute address, as seen from code
    /// executing with the start of the region at `load_address`.
    pub fn put_call_target(&mut self, load_address: u32, routine: u32) {
        let next = load_address.wrapping_add(self.pos as u32).wrapping_add(4);
        self.put_u32(routine.wrapping_sub(next));
    }

    /// Overwrite two already written bytes at `offset`.
    /// The cursor does not move.
    pub fn put_u16_at(&mut self, offset: usize, value: u16) {
        self.put_at(offset, &value.to_le_bytes());
    }

    /// Overwrite four already written bytes at `offset`.
    /// The cursor does not move.
    pub fn put_u32_at(&mut self, offset: usize, value: u32) {
        self.put_at(offset, &value.to_le_bytes());
    }

    /// Backpatch the 32-bit field at `slot` so that it points at `target`.
    pub fn put_relative_at(&mut self, slot: usize, target: usize) {
        let displacement = target as i64 - slot as i64 - 4;
        self.put_u32_at(slot, displacement as i32 as u32);
    }

    fn put_at(&mut self, offset: usize, bytes: &[u8]) {
        // only bytes behind the cursor may be patched
        match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.pos => self.buffer[offset..end].copy_from_slice(bytes),
            _ => self.failed = true,
        }
    }
}
