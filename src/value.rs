//! Dynamic record values.
//!
//! Record classes are registered at runtime, so records are dynamic values:
//! an ordered vector of [`Value`] slots matching the class descriptor field
//! for field. [`Record`]s are created zero-initialized through the registry
//! and mutated through kind-checked setters, which keeps every record
//! encodable by construction.

use std::sync::Arc;

use crate::schema::{ClassId, ElemKind, FieldKind, TypeDescriptor};
use crate::{ProtocolError, Result};

/// One field slot of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    /// Fixed-capacity array; always holds exactly the declared element count.
    Array(Vec<Value>),
    /// Variable-length sequence.
    Seq(Vec<Value>),
    /// Embedded record of the declared class.
    Record(Record),
    /// Polymorphic slot: any registered record, or null.
    Any(Option<Box<Record>>),
    /// Optional owned record of the declared class.
    Ref(Option<Box<Record>>),
}

impl Value {
    /// The primitive kind of a scalar value, if it is one.
    pub(crate) fn primitive_kind(&self) -> Option<crate::schema::PrimitiveKind> {
        use crate::schema::PrimitiveKind as P;
        match self {
            Value::Bool(_) => Some(P::Bool),
            Value::U8(_) => Some(P::U8),
            Value::I8(_) => Some(P::I8),
            Value::U16(_) => Some(P::U16),
            Value::I16(_) => Some(P::I16),
            Value::U32(_) => Some(P::U32),
            Value::I32(_) => Some(P::I32),
            Value::U64(_) => Some(P::U64),
            Value::I64(_) => Some(P::I64),
            Value::F32(_) => Some(P::F32),
            Value::F64(_) => Some(P::F64),
            _ => None,
        }
    }

    /// Structural check of a value against a declared field kind.
    ///
    /// Arrays must carry exactly the declared element count; nested and
    /// reference records must carry the declared class id.
    pub fn conforms(&self, kind: &FieldKind) -> bool {
        match kind {
            FieldKind::Primitive(p) => self.primitive_kind() == Some(*p),
            FieldKind::Str => matches!(self, Value::Str(_)),
            FieldKind::Array { len, elem } => match self {
                Value::Array(xs) => {
                    xs.len() == *len as usize && xs.iter().all(|x| x.conforms_elem(elem))
                }
                _ => false,
            },
            FieldKind::Seq { elem } => match self {
                Value::Seq(xs) => xs.iter().all(|x| x.conforms_elem(elem)),
                _ => false,
            },
            FieldKind::Nested(class_id) => match self {
                Value::Record(r) => r.class_id() == *class_id,
                _ => false,
            },
            FieldKind::Any => matches!(self, Value::Any(_)),
            FieldKind::Ref(class_id) => match self {
                Value::Ref(r) => r.as_ref().map_or(true, |r| r.class_id() == *class_id),
                _ => false,
            },
        }
    }

    pub(crate) fn conforms_elem(&self, elem: &ElemKind) -> bool {
        match elem {
            ElemKind::Primitive(p) => self.primitive_kind() == Some(*p),
            ElemKind::Str => matches!(self, Value::Str(_)),
            ElemKind::Nested(class_id) => match self {
                Value::Record(r) => r.class_id() == *class_id,
                _ => false,
            },
            ElemKind::Any => matches!(self, Value::Any(_)),
            ElemKind::Ref(class_id) => match self {
                Value::Ref(r) => r.as_ref().map_or(true, |r| r.class_id() == *class_id),
                _ => false,
            },
        }
    }

    /// Widening unsigned view of an integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Widening signed view of an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(i64::from(*v)),
            Value::I16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

/// A dynamic record instance of a registered class.
///
/// Field slots are ordered exactly as the class descriptor declares them.
#[derive(Debug, Clone)]
pub struct Record {
    descriptor: Arc<TypeDescriptor>,
    fields: Vec<Value>,
}

impl Record {
    pub(crate) fn from_parts(descriptor: Arc<TypeDescriptor>, fields: Vec<Value>) -> Self {
        Self { descriptor, fields }
    }

    pub fn class_id(&self) -> ClassId {
        self.descriptor.class_id
    }

    /// Schema name of the record's class.
    pub fn class_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Field slots in declaration order.
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Value] {
        &mut self.fields
    }

    /// Look up a field slot by declared name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let (idx, _) = self.descriptor.field_named(name)?;
        self.fields.get(idx)
    }

    /// Replace a field slot, validating the value against the declared kind.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let (idx, layout) = self.descriptor.field_named(name).ok_or_else(|| {
            ProtocolError::UnknownField {
                class_id: self.descriptor.class_id.0,
                name: name.to_string(),
            }
        })?;
        if !value.conforms(&layout.kind) {
            return Err(ProtocolError::FieldKindMismatch {
                class_id: self.descriptor.class_id.0,
                field: layout.name.clone(),
            });
        }
        self.fields[idx] = value;
        Ok(())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name)?.as_u64()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.class_id == other.descriptor.class_id && self.fields == other.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, PrimitiveKind, Schema, TypeDescriptor};

    fn test_record() -> Record {
        let descriptor = Arc::new(TypeDescriptor::analyze(
            ClassId(9),
            Schema::new("T")
                .field("n", FieldKind::Primitive(PrimitiveKind::I32))
                .field("s", FieldKind::Str)
                .field(
                    "xs",
                    FieldKind::Seq {
                        elem: ElemKind::Primitive(PrimitiveKind::U16),
                    },
                ),
        ));
        let fields = vec![Value::I32(0), Value::Str(String::new()), Value::Seq(vec![])];
        Record::from_parts(descriptor, fields)
    }

    #[test]
    fn test_set_checks_kind() {
        let mut rec = test_record();
        rec.set("n", Value::I32(5)).unwrap();
        assert_eq!(rec.get_i32("n"), Some(5));

        let err = rec.set("n", Value::U32(5)).unwrap_err();
        assert!(matches!(
            err,
            crate::ProtocolError::FieldKindMismatch { .. }
        ));

        let err = rec.set("nope", Value::I32(1)).unwrap_err();
        assert!(matches!(err, crate::ProtocolError::UnknownField { .. }));
    }

    #[test]
    fn test_seq_elements_checked() {
        let mut rec = test_record();
        rec.set("xs", Value::Seq(vec![Value::U16(1), Value::U16(2)]))
            .unwrap();
        let err = rec
            .set("xs", Value::Seq(vec![Value::U16(1), Value::I32(2)]))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ProtocolError::FieldKindMismatch { .. }
        ));
    }

    #[test]
    fn test_array_conformance_requires_exact_len() {
        let kind = FieldKind::Array {
            len: 2,
            elem: ElemKind::Primitive(PrimitiveKind::U8),
        };
        assert!(Value::Array(vec![Value::U8(1), Value::U8(2)]).conforms(&kind));
        assert!(!Value::Array(vec![Value::U8(1)]).conforms(&kind));
        assert!(!Value::Array(vec![Value::U8(1), Value::U16(2)]).conforms(&kind));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::U16(7).as_u64(), Some(7));
        assert_eq!(Value::I8(-3).as_i64(), Some(-3));
        assert_eq!(Value::U16(7).as_i64(), None);
        assert_eq!(Value::Str("hi".into()).as_str(), Some("hi"));
        assert_eq!(Value::F32(1.5).as_f64(), Some(1.5));
    }
}
