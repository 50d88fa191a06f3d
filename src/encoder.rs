//! Record encoder.
//!
//! The encoder walks a class descriptor and the record's field slots in
//! lockstep: it writes a frame header with a zero length placeholder, emits
//! every field in declaration order, then patches the length. When a frame
//! outgrows the short length form the descriptor's big-data flag is latched
//! and the length field is widened in place, so all future frames of the
//! class start in the long form.

use crate::buffer::WireWriter;
use crate::header;
use crate::registry::Registry;
use crate::schema::{ElemKind, FieldKind, FieldLayout, PrimitiveKind, TypeDescriptor};
use crate::value::{Record, Value};
use crate::{ProtocolError, Result};

/// Encode one framed record at the writer's current position.
pub(crate) fn encode_record(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    record: &Record,
    w: &mut WireWriter,
) -> Result<()> {
    let start_pos = w.len();
    let wide_len = descriptor.is_big_data();
    let (_, len_pos) = header::write_placeholder(w, descriptor.class_id, wide_len);

    let values = record.fields();
    let mut i = 0;
    while i < descriptor.fields.len() {
        let layout = &descriptor.fields[i];
        if layout.merge_count > 1 {
            // Merged primitive run: one reservation covers the whole span.
            w.reserve(layout.pod_size);
            for j in i..i + layout.merge_count {
                let member = &descriptor.fields[j];
                let value = values
                    .get(j)
                    .ok_or_else(|| kind_mismatch(descriptor, member))?;
                let kind = member
                    .kind
                    .primitive()
                    .ok_or_else(|| kind_mismatch(descriptor, member))?;
                if !write_primitive(w, kind, value) {
                    return Err(kind_mismatch(descriptor, member));
                }
            }
            i += layout.merge_count;
        } else {
            let value = values
                .get(i)
                .ok_or_else(|| kind_mismatch(descriptor, layout))?;
            encode_field(registry, descriptor, layout, value, w)?;
            i += 1;
        }
    }

    finalize_frame(descriptor, w, start_pos, len_pos, wide_len)
}

fn encode_field(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    value: &Value,
    w: &mut WireWriter,
) -> Result<()> {
    match layout.kind {
        FieldKind::Primitive(p) => {
            if !write_primitive(w, p, value) {
                return Err(kind_mismatch(descriptor, layout));
            }
        }
        FieldKind::Str => match value {
            Value::Str(s) => write_string(w, s)?,
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
        FieldKind::Array { len, elem } => match value {
            // The declared capacity is emitted, so the slot must hold
            // exactly that many elements.
            Value::Array(xs) if xs.len() == len as usize => {
                w.write_u32(len);
                encode_elems(registry, descriptor, layout, elem, xs, w)?;
            }
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
        FieldKind::Seq { elem } => match value {
            Value::Seq(xs) => {
                w.write_u32(xs.len() as u32);
                encode_elems(registry, descriptor, layout, elem, xs, w)?;
            }
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
        FieldKind::Nested(class_id) => match value {
            Value::Record(nested) => encode_framed(registry, Some(class_id), nested, w)?,
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
        FieldKind::Any => match value {
            Value::Any(None) => header::write_empty_header(w),
            Value::Any(Some(nested)) => encode_framed(registry, None, nested, w)?,
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
        FieldKind::Ref(class_id) => match value {
            Value::Ref(None) => header::write_empty_header(w),
            Value::Ref(Some(nested)) => encode_framed(registry, Some(class_id), nested, w)?,
            _ => return Err(kind_mismatch(descriptor, layout)),
        },
    }
    Ok(())
}

fn encode_elems(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    layout: &FieldLayout,
    elem: ElemKind,
    xs: &[Value],
    w: &mut WireWriter,
) -> Result<()> {
    match elem {
        ElemKind::Primitive(p) => {
            w.reserve(xs.len() * p.width());
            for x in xs {
                if !write_primitive(w, p, x) {
                    return Err(kind_mismatch(descriptor, layout));
                }
            }
        }
        ElemKind::Str => {
            for x in xs {
                match x {
                    Value::Str(s) => write_string(w, s)?,
                    _ => return Err(kind_mismatch(descriptor, layout)),
                }
            }
        }
        ElemKind::Nested(class_id) => {
            for x in xs {
                match x {
                    Value::Record(nested) => encode_framed(registry, Some(class_id), nested, w)?,
                    _ => return Err(kind_mismatch(descriptor, layout)),
                }
            }
        }
        ElemKind::Any => {
            for x in xs {
                match x {
                    Value::Any(None) => header::write_empty_header(w),
                    Value::Any(Some(nested)) => encode_framed(registry, None, nested, w)?,
                    _ => return Err(kind_mismatch(descriptor, layout)),
                }
            }
        }
        ElemKind::Ref(class_id) => {
            for x in xs {
                match x {
                    Value::Ref(None) => header::write_empty_header(w),
                    Value::Ref(Some(nested)) => encode_framed(registry, Some(class_id), nested, w)?,
                    _ => return Err(kind_mismatch(descriptor, layout)),
                }
            }
        }
    }
    Ok(())
}

/// Encode a record as a sub-frame, verifying its class against the declared
/// class id when the field fixes one.
fn encode_framed(
    registry: &Registry,
    expected: Option<crate::schema::ClassId>,
    record: &Record,
    w: &mut WireWriter,
) -> Result<()> {
    if let Some(expected) = expected {
        if record.class_id() != expected {
            return Err(ProtocolError::ClassIdMismatch {
                expected: expected.0,
                actual: record.class_id().0,
            });
        }
    }
    let descriptor = registry
        .descriptor(record.class_id())
        .ok_or(ProtocolError::Unregistered(record.class_id().0))?;
    encode_record(registry, &descriptor, record, w)
}

fn write_string(w: &mut WireWriter, s: &str) -> Result<()> {
    if s.len() > 0xFFFF {
        return Err(ProtocolError::StringTooLong { len: s.len() });
    }
    w.write_u16(s.len() as u16);
    w.write_bytes(s.as_bytes());
    Ok(())
}

fn write_primitive(w: &mut WireWriter, kind: PrimitiveKind, value: &Value) -> bool {
    match (kind, value) {
        (PrimitiveKind::Bool, Value::Bool(v)) => w.write_u8(u8::from(*v)),
        (PrimitiveKind::U8, Value::U8(v)) => w.write_u8(*v),
        (PrimitiveKind::I8, Value::I8(v)) => w.write_u8(*v as u8),
        (PrimitiveKind::U16, Value::U16(v)) => w.write_u16(*v),
        (PrimitiveKind::I16, Value::I16(v)) => w.write_u16(*v as u16),
        (PrimitiveKind::U32, Value::U32(v)) => w.write_u32(*v),
        (PrimitiveKind::I32, Value::I32(v)) => w.write_u32(*v as u32),
        (PrimitiveKind::U64, Value::U64(v)) => w.write_u64(*v),
        (PrimitiveKind::I64, Value::I64(v)) => w.write_u64(*v as u64),
        (PrimitiveKind::F32, Value::F32(v)) => w.write_f32(*v),
        (PrimitiveKind::F64, Value::F64(v)) => w.write_f64(*v),
        _ => return false,
    }
    true
}

/// Patch the frame length, widening the length field and latching the class
/// descriptor when the frame outgrows the short form.
fn finalize_frame(
    descriptor: &TypeDescriptor,
    w: &mut WireWriter,
    start_pos: usize,
    len_pos: usize,
    wide_len: bool,
) -> Result<()> {
    let data_len = w.len() - start_pos;
    if wide_len {
        if data_len > u32::MAX as usize {
            return Err(ProtocolError::PayloadTooLong { len: data_len });
        }
        w.patch_u32(len_pos, data_len as u32);
    } else if data_len <= 0xFFFF {
        w.patch_u16(len_pos, data_len as u16);
    } else {
        descriptor.promote_big_data();
        header::widen_length_field(w, start_pos, len_pos);
        let data_len = data_len + 2;
        if data_len > u32::MAX as usize {
            return Err(ProtocolError::PayloadTooLong { len: data_len });
        }
        tracing::debug!(
            class_id = descriptor.class_id.0,
            frame_len = data_len,
            "frame outgrew the short length form; class latched to long form"
        );
        w.patch_u32(len_pos, data_len as u32);
    }
    Ok(())
}

fn kind_mismatch(descriptor: &TypeDescriptor, layout: &FieldLayout) -> ProtocolError {
    ProtocolError::FieldKindMismatch {
        class_id: descriptor.class_id.0,
        field: layout.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::schema::{ClassId, Schema};

    #[test]
    fn test_single_i32_frame_bytes() {
        let registry = Registry::new();
        registry.register(
            ClassId(1000),
            Schema::new("Test").field("a", FieldKind::Primitive(PrimitiveKind::I32)),
        );
        let mut record = registry.new_record(ClassId(1000)).unwrap();
        record.set("a", Value::I32(0x01020304)).unwrap();

        let bytes = registry.marshal(&record).unwrap();
        assert_eq!(
            bytes,
            [0x98, 0x6D, 0xE8, 0x03, 0x0A, 0x00, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_empty_seq_writes_count_only() {
        let registry = Registry::new();
        registry.register(
            ClassId(2),
            Schema::new("Seqs").field(
                "xs",
                FieldKind::Seq {
                    elem: ElemKind::Primitive(PrimitiveKind::I32),
                },
            ),
        );
        let record = registry.new_record(ClassId(2)).unwrap();
        let bytes = registry.marshal(&record).unwrap();
        // 6-byte header + 4-byte zero count.
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[6..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_string_too_long() {
        let registry = Registry::new();
        registry.register(ClassId(3), Schema::new("S").field("s", FieldKind::Str));
        let mut record = registry.new_record(ClassId(3)).unwrap();
        record
            .set("s", Value::Str("x".repeat(0x10000)))
            .unwrap();
        let err = registry.marshal(&record).unwrap_err();
        assert!(matches!(err, ProtocolError::StringTooLong { len: 0x10000 }));
    }

    #[test]
    fn test_marshal_unregistered() {
        let registry = Registry::new();
        registry.register(
            ClassId(4),
            Schema::new("T").field("a", FieldKind::Primitive(PrimitiveKind::U8)),
        );
        let record = registry.new_record(ClassId(4)).unwrap();
        let other = Registry::new();
        let err = other.marshal(&record).unwrap_err();
        assert!(matches!(err, ProtocolError::Unregistered(4)));
    }

    #[test]
    fn test_null_ref_is_empty_header() {
        let registry = Registry::new();
        registry.register(
            ClassId(5),
            Schema::new("T").field("a", FieldKind::Primitive(PrimitiveKind::U8)),
        );
        registry.register(
            ClassId(6),
            Schema::new("Holder").field("link", FieldKind::Ref(ClassId(5))),
        );
        let record = registry.new_record(ClassId(6)).unwrap();
        let bytes = registry.marshal(&record).unwrap();
        assert_eq!(
            &bytes[6..],
            &[0x98, 0x6D, 0x00, 0x00, 0x06, 0x00],
            "null reference must encode as the 6-byte empty header"
        );
    }

    #[test]
    fn test_nested_class_mismatch_fails() {
        let registry = Registry::new();
        registry.register(
            ClassId(7),
            Schema::new("A").field("a", FieldKind::Primitive(PrimitiveKind::U8)),
        );
        registry.register(
            ClassId(8),
            Schema::new("B").field("b", FieldKind::Primitive(PrimitiveKind::U8)),
        );
        registry.register(
            ClassId(9),
            Schema::new("Holder").field("inner", FieldKind::Nested(ClassId(7))),
        );
        let mut record = registry.new_record(ClassId(9)).unwrap();
        // Bypass the checked setter to model a stale record.
        let wrong = registry.new_record(ClassId(8)).unwrap();
        record.fields_mut()[0] = Value::Record(wrong);

        let err = registry.marshal(&record).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ClassIdMismatch {
                expected: 7,
                actual: 8
            }
        ));
    }
}
