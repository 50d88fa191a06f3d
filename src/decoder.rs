//! Record decoder.
//!
//! The decoder mirrors the encoder's walk over the class descriptor, but is
//! deliberately forgiving at frame boundaries: a frame that ends before the
//! descriptor runs out leaves the remaining fields at their defaults, and a
//! frame that carries more bytes than the descriptor knows about is skipped
//! to its declared end. That pair of rules is what makes append-only schema
//! evolution work in both directions.
//!
//! Every read is bounded by the enclosing frame: a sub-frame or element
//! that claims bytes past its parent's declared end is a decode failure,
//! never an out-of-frame read.

use crate::buffer::WireReader;
use crate::header::{RecordHeader, MIN_HEADER_LEN};
use crate::registry::Registry;
use crate::schema::{ClassId, ElemKind, FieldKind, FieldLayout, PrimitiveKind, TypeDescriptor};
use crate::value::{Record, Value};
use crate::{ProtocolError, Result, ARRAY_LEN_SIZE, STRING_LEN_SIZE};

/// Outcome of a single field decode inside a frame walk.
enum FieldOutcome {
    Decoded,
    /// The field's prefix does not fit in what is left of the frame: an
    /// older producer stopped here. The rest of the fields keep defaults.
    Stop,
}

/// Decode one framed record at the reader's position.
///
/// Returns `Ok(None)` for the canonical empty header (class id zero): the
/// null encoding of polymorphic and reference slots. `limit` is the
/// absolute position this frame may not reach past (the enclosing frame's
/// end, or the buffer length at top level).
pub(crate) fn decode_framed(
    registry: &Registry,
    r: &mut WireReader<'_>,
    limit: usize,
) -> Result<Option<Record>> {
    let start_pos = r.pos();
    let header = RecordHeader::read_from(r).ok_or(ProtocolError::InvalidHeader)?;
    let frame_end = start_pos + header.data_length as usize;
    if frame_end > limit {
        return Err(ProtocolError::Truncated {
            need: header.data_length as usize,
            got: limit - start_pos,
        });
    }

    if header.class_id == ClassId::NULL {
        if header.is_empty_payload() {
            r.set_pos(frame_end);
            return Ok(None);
        }
        return Err(ProtocolError::Unregistered(ClassId::NULL.0));
    }

    let descriptor = registry
        .descriptor(header.class_id)
        .ok_or(ProtocolError::Unregistered(header.class_id.0))?;
    let mut record = registry.record_of(&descriptor)?;
    decode_into(registry, &descriptor, &mut record, r, &header, start_pos)?;
    Ok(Some(record))
}

/// Walk a frame's payload into an allocated record, then land the reader on
/// the frame end. The reader is advanced to the frame end even when a field
/// fails, so an enclosing walk could continue past a poisoned sub-frame.
fn decode_into(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    record: &mut Record,
    r: &mut WireReader<'_>,
    header: &RecordHeader,
    start_pos: usize,
) -> Result<()> {
    let frame_end = start_pos + header.data_length as usize;
    let walk = walk_fields(registry, descriptor, record, r, frame_end);
    r.set_pos(frame_end);
    walk
}

fn walk_fields(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    record: &mut Record,
    r: &mut WireReader<'_>,
    frame_end: usize,
) -> Result<()> {
    let mut i = 0;
    'walk: while i < descriptor.fields.len() {
        if r.pos() >= frame_end {
            break;
        }
        let layout = &descriptor.fields[i];
        if layout.merge_count > 1 {
            // Merged primitive run. Decode whole members while they fit;
            // a run cut short by an older producer defaults its tail.
            for j in i..i + layout.merge_count {
                let member = &descriptor.fields[j];
                let kind = member
                    .kind
                    .primitive()
                    .ok_or_else(|| decode_failed(descriptor, member))?;
                if r.pos() + kind.width() > frame_end {
                    break 'walk;
                }
                record.fields_mut()[j] =
                    read_primitive(r, kind).ok_or_else(|| decode_failed(descriptor, member))?;
            }
            i += layout.merge_count;
        } else {
            let slot = &mut record.fields_mut()[i];
            match decode_field(registry, descriptor, layout, slot, r, frame_end)? {
                FieldOutcome::Decoded => i += 1,
                FieldOutcome::Stop => break 'walk,
            }
        }
    }
    Ok(())
}

fn decode_field(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    slot: &mut Value,
    r: &mut WireReader<'_>,
    frame_end: usize,
) -> Result<FieldOutcome> {
    match layout.kind {
        FieldKind::Primitive(p) => {
            if r.pos() + p.width() > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            *slot = read_primitive(r, p).ok_or_else(|| decode_failed(descriptor, layout))?;
        }
        FieldKind::Str => {
            if r.pos() + STRING_LEN_SIZE > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            *slot = Value::Str(
                read_string(r, frame_end).ok_or_else(|| decode_failed(descriptor, layout))?,
            );
        }
        FieldKind::Array { len, elem } => {
            if r.pos() + ARRAY_LEN_SIZE > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            let wire_count = r
                .read_u32()
                .ok_or_else(|| decode_failed(descriptor, layout))?;
            decode_array(registry, descriptor, layout, len, elem, wire_count, slot, r, frame_end)?;
        }
        FieldKind::Seq { elem } => {
            if r.pos() + ARRAY_LEN_SIZE > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            let wire_count = r
                .read_u32()
                .ok_or_else(|| decode_failed(descriptor, layout))?;
            *slot = Value::Seq(decode_seq(
                registry, descriptor, layout, elem, wire_count, r, frame_end,
            )?);
        }
        FieldKind::Nested(class_id) => {
            if r.pos() + MIN_HEADER_LEN > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            *slot = Value::Record(decode_nested(registry, r, frame_end, class_id)?);
        }
        FieldKind::Any => {
            if r.pos() + MIN_HEADER_LEN > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            *slot = Value::Any(decode_framed(registry, r, frame_end)?.map(Box::new));
        }
        FieldKind::Ref(class_id) => {
            if r.pos() + MIN_HEADER_LEN > frame_end {
                return Ok(FieldOutcome::Stop);
            }
            *slot = Value::Ref(decode_ref(registry, r, frame_end, class_id)?.map(Box::new));
        }
    }
    Ok(FieldOutcome::Decoded)
}

/// Decode a fixed-capacity array slot.
///
/// The wire count may disagree with the declared capacity: a shorter wire
/// array fills the leading slots, a longer one fills every slot and then
/// consumes and discards the extras by the declared element kind, so the
/// reader stays aligned on the next field.
#[allow(clippy::too_many_arguments)]
fn decode_array(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    declared_len: u32,
    elem: ElemKind,
    wire_count: u32,
    slot: &mut Value,
    r: &mut WireReader<'_>,
    frame_end: usize,
) -> Result<()> {
    let xs = match slot {
        Value::Array(xs) => xs,
        _ => return Err(decode_failed(descriptor, layout)),
    };

    if let ElemKind::Primitive(p) = elem {
        let width = p.width() as u64;
        let wire_bytes = u64::from(wire_count) * width;
        if ((frame_end - r.pos()) as u64) < wire_bytes {
            return Err(decode_failed(descriptor, layout));
        }
        let keep = wire_count.min(declared_len);
        for x in xs.iter_mut().take(keep as usize) {
            *x = read_primitive(r, p).ok_or_else(|| decode_failed(descriptor, layout))?;
        }
        // Skip past whatever the declared capacity could not hold.
        let skipped = u64::from(wire_count - keep) * width;
        r.set_pos(r.pos() + skipped as usize);
        return Ok(());
    }

    for idx in 0..wire_count {
        let value = decode_elem(registry, descriptor, layout, elem, r, frame_end)?;
        if (idx as usize) < xs.len() {
            xs[idx as usize] = value;
        }
    }
    Ok(())
}

/// Decode a sequence slot, allocating exactly what the frame can hold.
fn decode_seq(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    elem: ElemKind,
    wire_count: u32,
    r: &mut WireReader<'_>,
    frame_end: usize,
) -> Result<Vec<Value>> {
    // Clamp the pre-allocation by the bytes actually present, so a forged
    // count cannot force a huge allocation before the decode fails.
    let plausible = (frame_end - r.pos()) / elem.min_wire_size();
    let mut xs = Vec::with_capacity((wire_count as usize).min(plausible));
    for _ in 0..wire_count {
        xs.push(decode_elem(registry, descriptor, layout, elem, r, frame_end)?);
    }
    Ok(xs)
}

fn decode_elem(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    elem: ElemKind,
    r: &mut WireReader<'_>,
    frame_end: usize,
) -> Result<Value> {
    Ok(match elem {
        ElemKind::Primitive(p) => {
            if r.pos() + p.width() > frame_end {
                return Err(decode_failed(descriptor, layout));
            }
            read_primitive(r, p).ok_or_else(|| decode_failed(descriptor, layout))?
        }
        ElemKind::Str => Value::Str(
            read_string(r, frame_end).ok_or_else(|| decode_failed(descriptor, layout))?,
        ),
        ElemKind::Nested(class_id) => {
            Value::Record(decode_nested(registry, r, frame_end, class_id)?)
        }
        ElemKind::Any => Value::Any(decode_framed(registry, r, frame_end)?.map(Box::new)),
        ElemKind::Ref(class_id) => {
            Value::Ref(decode_ref(registry, r, frame_end, class_id)?.map(Box::new))
        }
    })
}

/// Decode an embedded record whose class id is fixed by the schema.
fn decode_nested(
    registry: &Registry,
    r: &mut WireReader<'_>,
    limit: usize,
    expected: ClassId,
) -> Result<Record> {
    let start_pos = r.pos();
    let header = RecordHeader::read_from(r).ok_or(ProtocolError::InvalidHeader)?;
    let frame_end = start_pos + header.data_length as usize;
    if frame_end > limit {
        return Err(ProtocolError::Truncated {
            need: header.data_length as usize,
            got: limit - start_pos,
        });
    }
    if header.class_id != expected {
        return Err(ProtocolError::ClassIdMismatch {
            expected: expected.0,
            actual: header.class_id.0,
        });
    }
    let descriptor = registry
        .descriptor(expected)
        .ok_or(ProtocolError::Unregistered(expected.0))?;
    let mut record = registry.record_of(&descriptor)?;
    decode_into(registry, &descriptor, &mut record, r, &header, start_pos)?;
    Ok(record)
}

/// Decode an owned-reference slot: an empty frame is null, anything else
/// must carry the declared class.
fn decode_ref(
    registry: &Registry,
    r: &mut WireReader<'_>,
    limit: usize,
    expected: ClassId,
) -> Result<Option<Record>> {
    let start_pos = r.pos();
    let header = RecordHeader::read_from(r).ok_or(ProtocolError::InvalidHeader)?;
    let frame_end = start_pos + header.data_length as usize;
    if frame_end > limit {
        return Err(ProtocolError::Truncated {
            need: header.data_length as usize,
            got: limit - start_pos,
        });
    }
    if header.is_empty_payload() {
        r.set_pos(frame_end);
        return Ok(None);
    }
    if header.class_id != expected {
        return Err(ProtocolError::ClassIdMismatch {
            expected: expected.0,
            actual: header.class_id.0,
        });
    }
    let descriptor = registry
        .descriptor(expected)
        .ok_or(ProtocolError::Unregistered(expected.0))?;
    let mut record = registry.record_of(&descriptor)?;
    decode_into(registry, &descriptor, &mut record, r, &header, start_pos)?;
    Ok(Some(record))
}

fn read_string(r: &mut WireReader<'_>, frame_end: usize) -> Option<String> {
    if r.pos() + STRING_LEN_SIZE > frame_end {
        return None;
    }
    let len = r.read_u16()? as usize;
    if r.pos() + len > frame_end {
        return None;
    }
    let bytes = r.read_bytes(len)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn read_primitive(r: &mut WireReader<'_>, kind: PrimitiveKind) -> Option<Value> {
    Some(match kind {
        PrimitiveKind::Bool => Value::Bool(r.read_u8()? != 0),
        PrimitiveKind::U8 => Value::U8(r.read_u8()?),
        PrimitiveKind::I8 => Value::I8(r.read_u8()? as i8),
        PrimitiveKind::U16 => Value::U16(r.read_u16()?),
        PrimitiveKind::I16 => Value::I16(r.read_u16()? as i16),
        PrimitiveKind::U32 => Value::U32(r.read_u32()?),
        PrimitiveKind::I32 => Value::I32(r.read_u32()? as i32),
        PrimitiveKind::U64 => Value::U64(r.read_u64()?),
        PrimitiveKind::I64 => Value::I64(r.read_u64()? as i64),
        PrimitiveKind::F32 => Value::F32(r.read_f32()?),
        PrimitiveKind::F64 => Value::F64(r.read_f64()?),
    })
}

fn decode_failed(descriptor: &TypeDescriptor, layout: &FieldLayout) -> ProtocolError {
    ProtocolError::DecodeFailed {
        class_id: descriptor.class_id.0,
        field: layout.name.clone(),
    }
}
