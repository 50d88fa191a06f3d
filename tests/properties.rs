//! Property tests: the encode/decode round-trip over generated records.

mod common;

use common::{game_registry, SLOT_DATA};
use proptest::prelude::*;
use recordwire::{ClassId, ElemKind, FieldKind, PrimitiveKind, Registry, Schema, Value};

const MIXED: ClassId = ClassId(3000);

fn mixed_registry() -> Registry {
    let registry = game_registry();
    registry.register(
        MIXED,
        Schema::new("Mixed")
            .field("flag", FieldKind::Primitive(PrimitiveKind::Bool))
            .field("n", FieldKind::Primitive(PrimitiveKind::I32))
            .field("big", FieldKind::Primitive(PrimitiveKind::U64))
            .field("ratio", FieldKind::Primitive(PrimitiveKind::F64))
            .field("label", FieldKind::Str)
            .field(
                "xs",
                FieldKind::Seq {
                    elem: ElemKind::Primitive(PrimitiveKind::U16),
                },
            )
            .field("link", FieldKind::Ref(SLOT_DATA)),
    );
    registry
}

proptest! {
    #[test]
    fn roundtrip_preserves_values(
        flag in any::<bool>(),
        n in any::<i32>(),
        big in any::<u64>(),
        ratio in any::<f64>().prop_filter("comparable", |f| f.is_finite()),
        label in "[a-zA-Z0-9 ]{0,32}",
        xs in prop::collection::vec(any::<u16>(), 0..16),
        link_idx in prop::option::of(any::<i32>()),
    ) {
        let registry = mixed_registry();
        let mut record = registry.new_record(MIXED).unwrap();
        record.set("flag", Value::Bool(flag)).unwrap();
        record.set("n", Value::I32(n)).unwrap();
        record.set("big", Value::U64(big)).unwrap();
        record.set("ratio", Value::F64(ratio)).unwrap();
        record.set("label", Value::Str(label)).unwrap();
        record
            .set("xs", Value::Seq(xs.into_iter().map(Value::U16).collect()))
            .unwrap();
        if let Some(idx) = link_idx {
            let mut slot = registry.new_record(SLOT_DATA).unwrap();
            slot.set("idx", Value::I32(idx)).unwrap();
            record.set("link", Value::Ref(Some(Box::new(slot)))).unwrap();
        }

        let bytes = registry.marshal(&record).unwrap();
        let back = registry.unmarshal(&bytes).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn decoder_never_panics_on_noise(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let registry = mixed_registry();
        let _ = registry.unmarshal(&data);
    }
}
