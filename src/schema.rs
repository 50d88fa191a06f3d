//! Schema declarations and the registration-time field-layout analyzer.
//!
//! A [`Schema`] is the caller-facing declaration of a record class: an
//! ordered list of named fields drawn from a small set of kinds. At
//! registration the analyzer flattens the declaration into a
//! [`TypeDescriptor`] — the immutable walk plan shared by encoder and
//! decoder. Contiguous primitive fields are folded into merged runs so both
//! walkers can reserve and bounds-check one span per run instead of one per
//! field; the merge is invisible on the wire.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric identifier of a registered record class.
///
/// Ids at or below `0xFFFF` encode as u16 in frame headers ("short" ids);
/// larger ids force the wide class id header form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Class id zero is reserved for the empty header / null encoding.
    pub const NULL: ClassId = ClassId(0);

    /// True when the id fits the u16 header form.
    pub fn is_short(self) -> bool {
        self.0 <= 0xFFFF
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Fixed-width field kinds, all little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::U8 | PrimitiveKind::I8 => 1,
            PrimitiveKind::U16 | PrimitiveKind::I16 => 2,
            PrimitiveKind::U32 | PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::U64 | PrimitiveKind::I64 | PrimitiveKind::F64 => 8,
        }
    }
}

/// Element kind of an array or sequence field.
///
/// Arrays and sequences are one-dimensional: elements are primitives,
/// strings or framed records, never nested containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElemKind {
    Primitive(PrimitiveKind),
    Str,
    Nested(ClassId),
    Any,
    Ref(ClassId),
}

impl ElemKind {
    /// Smallest possible wire footprint of one element.
    ///
    /// Used to clamp sequence pre-allocation against the bytes actually
    /// present in a frame.
    pub(crate) fn min_wire_size(self) -> usize {
        match self {
            ElemKind::Primitive(p) => p.width(),
            ElemKind::Str => crate::STRING_LEN_SIZE,
            ElemKind::Nested(_) | ElemKind::Any | ElemKind::Ref(_) => crate::header::MIN_HEADER_LEN,
        }
    }
}

/// Declared kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Fixed-width scalar.
    Primitive(PrimitiveKind),
    /// u16 length-prefixed byte string; length < 65536.
    Str,
    /// Exactly `len` elements, count emitted as u32.
    Array { len: u32, elem: ElemKind },
    /// Variable-length, u32 count-prefixed.
    Seq { elem: ElemKind },
    /// Embedded record of a fixed class, framed with its own header.
    Nested(ClassId),
    /// Any registered record, framed with its own header.
    Any,
    /// Optional owned record of a fixed class; null is the empty header.
    Ref(ClassId),
}

impl FieldKind {
    pub fn primitive(self) -> Option<PrimitiveKind> {
        match self {
            FieldKind::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

/// One declared field: a debug-only name plus a kind.
///
/// Names are never emitted on the wire; the field order is the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Caller-facing schema declaration for a record class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field declaration. Field order is fixed once registered.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }
}

/// Flattened per-field walk entry produced by the analyzer.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub kind: FieldKind,
    /// Packed wire-layout offset of the field inside the record payload,
    /// counting each field at its minimum wire footprint. Informational;
    /// the walkers work from `merge_count`/`pod_size`.
    pub wire_offset: usize,
    /// Number of fields covered by this merged primitive run. Greater than
    /// one only on the head of a run; members keep one.
    pub merge_count: usize,
    /// Total encoded bytes of the run headed here (a lone primitive's own
    /// width; zero for non-primitive fields).
    pub pod_size: usize,
}

/// Immutable walk plan for one registered record class.
///
/// Created once at registration; only the big-data latch ever changes
/// afterwards.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub class_id: ClassId,
    pub name: String,
    pub fields: Vec<FieldLayout>,
    big_data: AtomicBool,
}

impl TypeDescriptor {
    /// Flatten a schema into its walk plan, folding contiguous primitive
    /// fields into merged runs.
    pub(crate) fn analyze(class_id: ClassId, schema: Schema) -> Self {
        let mut fields: Vec<FieldLayout> = Vec::with_capacity(schema.fields.len());
        let mut cursor = 0usize;
        let mut sum_offset = 0usize;
        let mut merge_idx = 0usize;
        let mut in_run = false;

        for def in schema.fields {
            let offset = cursor;
            let (width, min_size) = match def.kind {
                FieldKind::Primitive(p) => (p.width(), p.width()),
                FieldKind::Str => (0, crate::STRING_LEN_SIZE),
                FieldKind::Array { .. } | FieldKind::Seq { .. } => (0, crate::ARRAY_LEN_SIZE),
                FieldKind::Nested(_) | FieldKind::Any | FieldKind::Ref(_) => {
                    (0, crate::header::MIN_HEADER_LEN)
                }
            };
            cursor += min_size;

            let idx = fields.len();
            fields.push(FieldLayout {
                name: def.name,
                kind: def.kind,
                wire_offset: offset,
                merge_count: 1,
                pod_size: width,
            });

            if def.kind.primitive().is_none() {
                in_run = false;
                continue;
            }
            if in_run && offset == sum_offset {
                fields[merge_idx].merge_count += 1;
                fields[merge_idx].pod_size += width;
                sum_offset += width;
            } else {
                merge_idx = idx;
                in_run = true;
                sum_offset = offset + width;
            }
        }

        Self {
            class_id,
            name: schema.name,
            fields,
            big_data: AtomicBool::new(false),
        }
    }

    /// Current state of the write-sticky long-length latch.
    pub fn is_big_data(&self) -> bool {
        self.big_data.load(Ordering::Relaxed)
    }

    /// Latch the long-length form for all future encodes of this class.
    ///
    /// One-way; a concurrent double promotion produces identical bytes.
    pub(crate) fn promote_big_data(&self) {
        self.big_data.store(true, Ordering::Relaxed);
    }

    /// Locate a field by its declared name.
    pub fn field_named(&self, name: &str) -> Option<(usize, &FieldLayout)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(fields: &[(&str, FieldKind)]) -> TypeDescriptor {
        let mut schema = Schema::new("Test");
        for (name, kind) in fields {
            schema = schema.field(*name, *kind);
        }
        TypeDescriptor::analyze(ClassId(1), schema)
    }

    #[test]
    fn test_lone_primitive_is_its_own_run() {
        let d = descriptor(&[("a", FieldKind::Primitive(PrimitiveKind::I32))]);
        assert_eq!(d.fields[0].merge_count, 1);
        assert_eq!(d.fields[0].pod_size, 4);
    }

    #[test]
    fn test_contiguous_primitives_merge() {
        let d = descriptor(&[
            ("a", FieldKind::Primitive(PrimitiveKind::I32)),
            ("b", FieldKind::Primitive(PrimitiveKind::U16)),
            ("c", FieldKind::Primitive(PrimitiveKind::Bool)),
        ]);
        assert_eq!(d.fields[0].merge_count, 3);
        assert_eq!(d.fields[0].pod_size, 7);
        assert_eq!(d.fields[1].merge_count, 1);
        assert_eq!(d.fields[2].merge_count, 1);
    }

    #[test]
    fn test_composite_breaks_run() {
        let d = descriptor(&[
            ("a", FieldKind::Primitive(PrimitiveKind::I32)),
            ("s", FieldKind::Str),
            ("b", FieldKind::Primitive(PrimitiveKind::U16)),
            ("c", FieldKind::Primitive(PrimitiveKind::U16)),
        ]);
        assert_eq!(d.fields[0].merge_count, 1);
        assert_eq!(d.fields[0].pod_size, 4);
        assert_eq!(d.fields[2].merge_count, 2);
        assert_eq!(d.fields[2].pod_size, 4);
    }

    #[test]
    fn test_wire_offsets_are_packed() {
        let d = descriptor(&[
            ("a", FieldKind::Primitive(PrimitiveKind::Bool)),
            ("b", FieldKind::Primitive(PrimitiveKind::I32)),
            ("s", FieldKind::Str),
            ("c", FieldKind::Primitive(PrimitiveKind::U64)),
        ]);
        assert_eq!(d.fields[0].wire_offset, 0);
        assert_eq!(d.fields[1].wire_offset, 1);
        assert_eq!(d.fields[2].wire_offset, 5);
        assert_eq!(d.fields[3].wire_offset, 7);
        // Bool + i32 merge in the packed layout; the string breaks the run.
        assert_eq!(d.fields[0].merge_count, 2);
        assert_eq!(d.fields[0].pod_size, 5);
        assert_eq!(d.fields[3].merge_count, 1);
    }

    #[test]
    fn test_big_data_latch_is_one_way() {
        let d = descriptor(&[("a", FieldKind::Primitive(PrimitiveKind::U8))]);
        assert!(!d.is_big_data());
        d.promote_big_data();
        assert!(d.is_big_data());
        d.promote_big_data();
        assert!(d.is_big_data());
    }

    #[test]
    fn test_field_named() {
        let d = descriptor(&[
            ("idx", FieldKind::Primitive(PrimitiveKind::I32)),
            ("name", FieldKind::Str),
        ]);
        let (i, f) = d.field_named("name").unwrap();
        assert_eq!(i, 1);
        assert_eq!(f.kind, FieldKind::Str);
        assert!(d.field_named("missing").is_none());
    }

    #[test]
    fn test_class_id_short_form() {
        assert!(ClassId(0xFFFF).is_short());
        assert!(!ClassId(0x1_0000).is_short());
    }
}
