//! # Recordwire - Compact Binary Record Codec
//!
//! ## Purpose
//!
//! Type-directed encoder/decoder for a closed universe of registered record
//! classes. Every record class is identified by a numeric class id and is
//! described by an ordered field schema; the codec walks the registered
//! descriptor, emits a self-describing frame header, and packs field data in
//! a fixed little-endian wire layout. The format is append-only evolvable:
//! newer producers may add trailing fields that older consumers skip, and
//! older producers may omit trailing fields that newer consumers default.
//!
//! ## Architecture Role
//!
//! ```text
//! Application Records → [Registry + Descriptors] → Binary Frames
//!        ↑                       ↓                       ↓
//!    Dynamic              Field Layout              Transport /
//!    Values               Analysis                  Persistence
//! ```
//!
//! The crate sits between typed application state and raw transport bytes.
//! Transport, outer framing and domain record definitions live outside; the
//! codec is synchronous and operates on in-memory buffers only.
//!
//! ## Quick Start
//!
//! ```rust
//! use recordwire::{ClassId, FieldKind, PrimitiveKind, Schema};
//!
//! const SLOT_CLASS: ClassId = ClassId(1_000_011);
//!
//! recordwire::register(
//!     SLOT_CLASS,
//!     Schema::new("SlotData")
//!         .field("idx", FieldKind::Primitive(PrimitiveKind::I32))
//!         .field("slot_type", FieldKind::Primitive(PrimitiveKind::U16))
//!         .field("occupied", FieldKind::Primitive(PrimitiveKind::Bool)),
//! );
//!
//! let mut slot = recordwire::new_record(SLOT_CLASS).unwrap();
//! slot.set("idx", recordwire::Value::I32(7)).unwrap();
//!
//! let bytes = recordwire::marshal(&slot).unwrap();
//! let back = recordwire::unmarshal(&bytes).unwrap();
//! assert_eq!(back.get_i32("idx"), Some(7));
//! ```
//!
//! ## Wire Format
//!
//! Every framed record starts with a 6/8/10-byte header:
//!
//! ```text
//! Signature  u16        (sig & 0xFFFC) == 0x6D98; bit 0 = wide class id,
//!                       bit 1 = wide data length
//! ClassId    u16 | u32  u32 when bit 0 is set
//! DataLength u16 | u32  u32 when bit 1 is set; counts the whole frame
//!                       including the header itself
//! Payload    DataLength - HeaderLength bytes
//! ```
//!
//! Strings are `u16` length-prefixed, arrays and sequences `u32`
//! count-prefixed, nested/polymorphic/reference fields are full frames, and
//! a null reference is the canonical 6-byte empty header.

use thiserror::Error;

pub mod buffer;
pub mod decoder;
pub mod encoder;
pub mod header;
pub mod registry;
pub mod schema;
pub mod value;

pub use header::{RecordHeader, MAX_HEADER_LEN, MIN_HEADER_LEN, SIGNATURE, SIGNATURE_MASK};
pub use registry::{global, Registry};
pub use schema::{
    ClassId, ElemKind, FieldDef, FieldKind, FieldLayout, PrimitiveKind, Schema, TypeDescriptor,
};
pub use value::{Record, Value};

/// Wire size of a string length prefix.
pub const STRING_LEN_SIZE: usize = 2;
/// Wire size of an array/sequence count prefix.
pub const ARRAY_LEN_SIZE: usize = 4;

/// Errors surfaced by the codec
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("class {0} is not registered")]
    Unregistered(u32),

    #[error("invalid record header")]
    InvalidHeader,

    #[error("payload truncated: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("string too long: {len} bytes (max 65535)")]
    StringTooLong { len: usize },

    #[error("payload too long: {len} bytes")]
    PayloadTooLong { len: usize },

    #[error("class id mismatch: expected {expected}, got {actual}")]
    ClassIdMismatch { expected: u32, actual: u32 },

    #[error("decoding class {class_id} failed at field `{field}`")]
    DecodeFailed { class_id: u32, field: String },

    #[error("value does not match the declared kind of field `{field}` in class {class_id}")]
    FieldKindMismatch { class_id: u32, field: String },

    #[error("class {class_id} has no field named `{name}`")]
    UnknownField { class_id: u32, name: String },
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Register a record class with the process-wide registry.
///
/// Idempotent: re-registering an already known class id is a no-op.
pub fn register(class_id: ClassId, schema: Schema) {
    global().register(class_id, schema);
}

/// Allocate a zero-initialized record of a registered class.
pub fn new_record(class_id: ClassId) -> Result<Record> {
    global().new_record(class_id)
}

/// Encode a record into a fresh byte buffer.
pub fn marshal(record: &Record) -> Result<Vec<u8>> {
    global().marshal(record)
}

/// Decode a framed record from a byte buffer.
pub fn unmarshal(data: &[u8]) -> Result<Record> {
    global().unmarshal(data)
}

/// Class id of a record, if its class is registered.
pub fn class_id_of(record: &Record) -> Option<ClassId> {
    global().class_id_of(record)
}

/// Descriptor of a registered class id.
pub fn descriptor_of(class_id: ClassId) -> Option<std::sync::Arc<TypeDescriptor>> {
    global().descriptor(class_id)
}

/// Descriptor of a registered class, looked up by schema name.
pub fn descriptor_by_name(name: &str) -> Option<std::sync::Arc<TypeDescriptor>> {
    global().descriptor_by_name(name)
}
