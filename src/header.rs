//! Record frame header codec.
//!
//! A frame header is 6, 8 or 10 bytes long. The first two bytes carry a
//! 14-bit signature plus two width flags:
//!
//! ```text
//! 0x6D98 = 0110 1101 1001 10xx
//!                            |`- bit 0: class id is u32 (else u16)
//!                            `-- bit 1: data length is u32 (else u16)
//! ```
//!
//! The data length counts the whole frame including the header, so a frame
//! whose data length equals its header length carries no payload. The
//! canonical null-reference encoding is the 6-byte empty header: both flag
//! bits clear, class id 0, data length 6.

use crate::buffer::{WireReader, WireWriter};
use crate::schema::ClassId;

/// Fixed 14-bit frame signature.
pub const SIGNATURE: u16 = 0x6D98;
/// Mask selecting the signature bits; the low two bits are width flags.
pub const SIGNATURE_MASK: u16 = 0xFFFC;

/// Signature flag: class id is encoded as u32.
const FLAG_WIDE_CLASS_ID: u16 = 0x0001;
/// Signature flag: data length is encoded as u32.
const FLAG_WIDE_DATA_LEN: u16 = 0x0002;

/// Shortest possible header: u16 signature + u16 class id + u16 length.
pub const MIN_HEADER_LEN: usize = 6;
/// Longest possible header: both class id and length widened to u32.
pub const MAX_HEADER_LEN: usize = 10;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub class_id: ClassId,
    pub data_length: u32,
    pub header_length: u16,
}

impl RecordHeader {
    /// True when the frame carries no payload bytes.
    pub fn is_empty_payload(&self) -> bool {
        self.data_length == u32::from(self.header_length)
    }

    /// Payload byte count of the frame.
    pub fn payload_len(&self) -> usize {
        (self.data_length - u32::from(self.header_length)) as usize
    }

    /// Read and validate a frame header at the reader's position.
    ///
    /// Returns `None` when fewer than six bytes remain, the signature bits
    /// mismatch, a promised wide field is truncated, or the data length is
    /// smaller than the header itself. The cursor position is unspecified
    /// after a failed read.
    pub fn read_from(r: &mut WireReader<'_>) -> Option<RecordHeader> {
        if r.remaining() < MIN_HEADER_LEN {
            return None;
        }
        let sign = r.read_u16()?;
        if sign & SIGNATURE_MASK != SIGNATURE {
            return None;
        }

        let mut header_length = MIN_HEADER_LEN as u16;
        let class_id = if sign & FLAG_WIDE_CLASS_ID != 0 {
            header_length += 2;
            ClassId(r.read_u32()?)
        } else {
            ClassId(u32::from(r.read_u16()?))
        };
        let data_length = if sign & FLAG_WIDE_DATA_LEN != 0 {
            header_length += 2;
            r.read_u32()?
        } else {
            u32::from(r.read_u16()?)
        };

        if data_length < u32::from(header_length) {
            return None;
        }
        Some(RecordHeader {
            class_id,
            data_length,
            header_length,
        })
    }
}

/// Write a header with a zero length placeholder.
///
/// Returns `(header_length, length_field_pos)`; the encoder patches the
/// length field once the payload has been written. `wide_len` reflects the
/// descriptor's big-data latch at the time of the call.
pub(crate) fn write_placeholder(
    w: &mut WireWriter,
    class_id: ClassId,
    wide_len: bool,
) -> (usize, usize) {
    let wide_class = !class_id.is_short();
    let mut sign = SIGNATURE;
    if wide_class {
        sign |= FLAG_WIDE_CLASS_ID;
    }
    if wide_len {
        sign |= FLAG_WIDE_DATA_LEN;
    }

    w.write_u16(sign);
    if wide_class {
        w.write_u32(class_id.0);
    } else {
        w.write_u16(class_id.0 as u16);
    }
    let len_pos = w.len();
    if wide_len {
        w.write_u32(0);
    } else {
        w.write_u16(0);
    }

    let header_length = MIN_HEADER_LEN + usize::from(wide_class) * 2 + usize::from(wide_len) * 2;
    (header_length, len_pos)
}

/// Widen an already written short length field to u32 in place.
///
/// Opens a 2-byte gap at the length field (shifting the payload right) and
/// sets the wide-length signature flag. Returns nothing; the caller patches
/// the widened field afterwards.
pub(crate) fn widen_length_field(w: &mut WireWriter, start_pos: usize, len_pos: usize) {
    w.open_gap(len_pos, 2);
    let sign = u16::from_le_bytes([w.as_bytes()[start_pos], w.as_bytes()[start_pos + 1]]);
    w.patch_u16(start_pos, sign | FLAG_WIDE_DATA_LEN);
}

/// Write the canonical 6-byte empty header encoding a null reference.
pub(crate) fn write_empty_header(w: &mut WireWriter) {
    w.write_u16(SIGNATURE);
    w.write_u16(0);
    w.write_u16(MIN_HEADER_LEN as u16);
}
