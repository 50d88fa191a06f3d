//! Example record classes shared by the integration tests.
//!
//! The codec itself knows nothing about any domain; these game-flavored map
//! and slot schemas stand in for real application payloads.

use recordwire::{ClassId, ElemKind, FieldKind, PrimitiveKind, Registry, Schema};

pub const SLOT_DATA: ClassId = ClassId(1_000_011);
pub const MAP_INFO: ClassId = ClassId(1_000_012);

pub fn slot_schema() -> Schema {
    Schema::new("SlotData")
        .field("idx", FieldKind::Primitive(PrimitiveKind::I32))
        .field("slot_type", FieldKind::Primitive(PrimitiveKind::U16))
        .field("occupied", FieldKind::Primitive(PrimitiveKind::Bool))
        .field("place_item_id", FieldKind::Primitive(PrimitiveKind::I32))
        .field("sit_person_id", FieldKind::Primitive(PrimitiveKind::I32))
}

pub fn map_schema() -> Schema {
    Schema::new("MapInfo")
        .field("idx", FieldKind::Primitive(PrimitiveKind::I32))
        .field("name", FieldKind::Str)
        .field("refresh_point", FieldKind::Primitive(PrimitiveKind::U16))
        .field(
            "slots",
            FieldKind::Seq {
                elem: ElemKind::Nested(SLOT_DATA),
            },
        )
        .field("max_count", FieldKind::Primitive(PrimitiveKind::I32))
        .field("max_queue", FieldKind::Primitive(PrimitiveKind::I32))
        .field("cook_exp", FieldKind::Primitive(PrimitiveKind::I32))
        .field("refresh_seconds", FieldKind::Primitive(PrimitiveKind::I32))
}

/// Fresh registry with the example classes registered.
pub fn game_registry() -> Registry {
    let registry = Registry::new();
    registry.register(MAP_INFO, map_schema());
    registry.register(SLOT_DATA, slot_schema());
    registry
}
