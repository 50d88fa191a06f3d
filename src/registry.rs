//! Process-wide record class registry.
//!
//! The registry maps class ids to their analyzed descriptors and schema
//! names back to class ids. It is populated during process initialization
//! and effectively read-only afterwards; reads are lock-free through the
//! sharded maps. Tests build private `Registry` instances to model producer
//! and consumer universes with diverging schemas.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::buffer::{WireReader, WireWriter};
use crate::schema::{ClassId, ElemKind, FieldKind, Schema, TypeDescriptor};
use crate::value::{Record, Value};
use crate::{ProtocolError, Result};

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide default registry backing the crate-level functions.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Mapping from class ids (and schema names) to type descriptors.
pub struct Registry {
    by_class: DashMap<ClassId, Arc<TypeDescriptor>>,
    by_name: DashMap<String, ClassId>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            by_class: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Register a record class.
    ///
    /// Idempotent: a class id that is already present keeps its original
    /// descriptor and the call is a no-op. Registration after any
    /// encode/decode of the same class is outside the contract.
    pub fn register(&self, class_id: ClassId, schema: Schema) -> Arc<TypeDescriptor> {
        if let Some(existing) = self.by_class.get(&class_id) {
            return existing.clone();
        }
        let descriptor = Arc::new(TypeDescriptor::analyze(class_id, schema));
        tracing::debug!(
            class_id = class_id.0,
            name = %descriptor.name,
            fields = descriptor.fields.len(),
            "registered record class"
        );
        self.by_name
            .entry(descriptor.name.clone())
            .or_insert(class_id);
        self.by_class.insert(class_id, descriptor.clone());
        descriptor
    }

    /// Descriptor of a registered class id.
    pub fn descriptor(&self, class_id: ClassId) -> Option<Arc<TypeDescriptor>> {
        self.by_class.get(&class_id).map(|d| d.clone())
    }

    /// Descriptor of a registered class, by schema name.
    pub fn descriptor_by_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let class_id = *self.by_name.get(name)?;
        self.descriptor(class_id)
    }

    /// Class id of a record, if its class is registered here.
    pub fn class_id_of(&self, record: &Record) -> Option<ClassId> {
        let class_id = record.class_id();
        self.by_class.contains_key(&class_id).then_some(class_id)
    }

    /// Allocate a zero-initialized record of a registered class.
    ///
    /// Primitive fields start at zero, strings empty, sequences empty,
    /// arrays filled with zero elements, nested records zero-initialized
    /// recursively, polymorphic and reference fields null.
    pub fn new_record(&self, class_id: ClassId) -> Result<Record> {
        let descriptor = self
            .descriptor(class_id)
            .ok_or(ProtocolError::Unregistered(class_id.0))?;
        self.record_of(&descriptor)
    }

    pub(crate) fn record_of(&self, descriptor: &Arc<TypeDescriptor>) -> Result<Record> {
        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for layout in &descriptor.fields {
            fields.push(self.default_value(&layout.kind)?);
        }
        Ok(Record::from_parts(descriptor.clone(), fields))
    }

    fn default_value(&self, kind: &FieldKind) -> Result<Value> {
        Ok(match kind {
            FieldKind::Primitive(p) => default_primitive(*p),
            FieldKind::Str => Value::Str(String::new()),
            FieldKind::Array { len, elem } => {
                let mut xs = Vec::with_capacity(*len as usize);
                for _ in 0..*len {
                    xs.push(self.default_elem(elem)?);
                }
                Value::Array(xs)
            }
            FieldKind::Seq { .. } => Value::Seq(Vec::new()),
            FieldKind::Nested(class_id) => Value::Record(self.new_record(*class_id)?),
            FieldKind::Any => Value::Any(None),
            FieldKind::Ref(_) => Value::Ref(None),
        })
    }

    pub(crate) fn default_elem(&self, elem: &ElemKind) -> Result<Value> {
        Ok(match elem {
            ElemKind::Primitive(p) => default_primitive(*p),
            ElemKind::Str => Value::Str(String::new()),
            ElemKind::Nested(class_id) => Value::Record(self.new_record(*class_id)?),
            ElemKind::Any => Value::Any(None),
            ElemKind::Ref(_) => Value::Ref(None),
        })
    }

    /// Encode a record into a fresh byte buffer.
    pub fn marshal(&self, record: &Record) -> Result<Vec<u8>> {
        let descriptor = self
            .descriptor(record.class_id())
            .ok_or(ProtocolError::Unregistered(record.class_id().0))?;
        let mut writer = WireWriter::with_capacity(256);
        crate::encoder::encode_record(self, &descriptor, record, &mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode a framed record from a byte buffer.
    pub fn unmarshal(&self, data: &[u8]) -> Result<Record> {
        let mut reader = WireReader::new(data);
        match crate::decoder::decode_framed(self, &mut reader, data.len())? {
            Some(record) => Ok(record),
            // A bare empty header carries class id zero, which no class may use.
            None => Err(ProtocolError::Unregistered(ClassId::NULL.0)),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_primitive(p: crate::schema::PrimitiveKind) -> Value {
    use crate::schema::PrimitiveKind as P;
    match p {
        P::Bool => Value::Bool(false),
        P::U8 => Value::U8(0),
        P::I8 => Value::I8(0),
        P::U16 => Value::U16(0),
        P::I16 => Value::I16(0),
        P::U32 => Value::U32(0),
        P::I32 => Value::I32(0),
        P::U64 => Value::U64(0),
        P::I64 => Value::I64(0),
        P::F32 => Value::F32(0.0),
        P::F64 => Value::F64(0.0),
    }
}
