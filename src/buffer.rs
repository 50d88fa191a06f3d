//! Little-endian primitive I/O over in-memory byte buffers.
//!
//! `WireWriter` owns a growable buffer and supports the patch-after-write
//! discipline the encoder relies on: frame headers are written as
//! placeholders, payload bytes follow, and the length field is patched (or
//! widened in place) once the payload size is known. `WireReader` is a
//! bounds-checked cursor over a caller-owned slice; it never copies until a
//! value is materialized.

use byteorder::{ByteOrder, LittleEndian};

/// Growable little-endian write buffer.
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.max(16)),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Pre-grow the buffer for an upcoming run of writes.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Overwrite two bytes at `at` with a little-endian u16.
    pub fn patch_u16(&mut self, at: usize, v: u16) {
        LittleEndian::write_u16(&mut self.buf[at..at + 2], v);
    }

    /// Overwrite four bytes at `at` with a little-endian u32.
    pub fn patch_u32(&mut self, at: usize, v: u32) {
        LittleEndian::write_u32(&mut self.buf[at..at + 4], v);
    }

    /// Insert `n` zero bytes at `at`, shifting the tail right.
    ///
    /// Used when a short length field must be widened in place after the
    /// payload has already been written.
    pub fn open_gap(&mut self, at: usize, n: usize) {
        let old_len = self.buf.len();
        self.buf.resize(old_len + n, 0);
        self.buf.copy_within(at..old_len, at + n);
        for b in &mut self.buf[at..at + n] {
            *b = 0;
        }
    }
}

/// Bounds-checked little-endian cursor over a borrowed buffer.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Absolute cursor position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute position, clamped to the buffer end.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let v = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(LittleEndian::read_u16(bytes))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(4)?;
        Some(LittleEndian::read_u32(bytes))
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.read_bytes(8)?;
        Some(LittleEndian::read_u64(bytes))
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        let bytes = self.read_bytes(4)?;
        Some(LittleEndian::read_f32(bytes))
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        let bytes = self.read_bytes(8)?;
        Some(LittleEndian::read_f64(bytes))
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_le_layout() {
        let mut w = WireWriter::with_capacity(16);
        w.write_u16(0x6D98);
        w.write_u32(0x01020304);
        assert_eq!(w.as_bytes(), &[0x98, 0x6D, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_patch_in_place() {
        let mut w = WireWriter::with_capacity(8);
        w.write_u16(0);
        w.write_u8(0xAA);
        w.patch_u16(0, 0xBEEF);
        assert_eq!(w.as_bytes(), &[0xEF, 0xBE, 0xAA]);
    }

    #[test]
    fn test_open_gap_shifts_tail() {
        let mut w = WireWriter::with_capacity(8);
        w.write_bytes(&[1, 2, 3, 4]);
        w.open_gap(2, 2);
        assert_eq!(w.as_bytes(), &[1, 2, 0, 0, 3, 4]);
        w.patch_u32(2, 0x0A0B0C0D);
        assert_eq!(w.as_bytes(), &[1, 2, 0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_reader_bounds() {
        let data = [0x01, 0x00, 0xFF];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_u16(), Some(1));
        assert_eq!(r.read_u16(), None);
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_u8(), Some(0xFF));
        assert_eq!(r.read_u8(), None);
    }

    #[test]
    fn test_reader_set_pos_clamps() {
        let data = [0u8; 4];
        let mut r = WireReader::new(&data);
        r.set_pos(100);
        assert_eq!(r.pos(), 4);
        assert_eq!(r.remaining(), 0);
    }
}
