//! The compact binary wire codec.
//!
//! Framing is key-driven: every field is `(tag << 3) | category` as a
//! varint, composites end with key 0, and lists/dictionaries carry a
//! one-byte framing header. Any unknown tag can be skipped from framing
//! alone, which is the entire schema-evolution story: add fields, never
//! renumber, and old readers step over what they do not know.

mod reader;
mod varint;
mod writer;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;

pub(crate) use varint::{push_varint, read_varint};

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MalformedKind, SyncError, SyncResult};
    use crate::fixture::*;
    use crate::refs::Ref;
    use crate::sync::{SyncOps, Syncable, Syncer};
    use crate::wire::WireCategory;

    #[test]
    fn inventory_round_trips() {
        let registry = fixture_registry();
        let mut inventory = Inventory {
            owner: String::from("Asha"),
            items: vec![
                Item {
                    name: String::from("Sword"),
                    count: 1,
                    quality: Quality::Rare,
                },
                Item::default(),
            ],
            slots: vec![
                Some(Item {
                    name: String::from("Potion"),
                    count: 3,
                    quality: Quality::Common,
                }),
                None,
                Some(Item::default()),
            ],
            counts: [(String::from("gems"), 4), (String::from("keys"), 1)]
                .into_iter()
                .collect(),
            main_hand: Some(Box::new(Sword {
                base: GearBase { durability: 80 },
                damage: 12,
            })),
            gold: 250,
            emblem: Ref::from_id(42),
        };

        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode(&mut inventory).unwrap().to_vec();
        let decoded: Inventory = BinaryReader::new(&registry).decode(&bytes).unwrap();

        assert_eq!(decoded.owner, "Asha");
        assert_eq!(decoded.items, inventory.items);
        assert_eq!(decoded.slots, inventory.slots);
        assert_eq!(decoded.counts, inventory.counts);
        assert_eq!(decoded.gold, 250);
        assert_eq!(decoded.emblem, Ref::from_id(42));
        let main_hand = decoded.main_hand.as_ref().unwrap();
        let sword = main_hand.as_any().downcast_ref::<Sword>().unwrap();
        assert_eq!(sword.damage, 12);
        assert_eq!(sword.base.durability, 80);
    }

    #[test]
    fn absent_fields_leave_destination_untouched() {
        let registry = fixture_registry();
        let mut partial = Item {
            name: String::new(),
            count: 5,
            quality: Quality::Common,
        };
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode(&mut partial).unwrap().to_vec();

        let mut target = Item {
            name: String::from("Keep"),
            count: 0,
            quality: Quality::Epic,
        };
        BinaryReader::new(&registry)
            .decode_into(&bytes, &mut target)
            .unwrap();
        assert_eq!(target.name, "Keep");
        assert_eq!(target.count, 5);
        assert_eq!(target.quality, Quality::Epic);
    }

    // A newer peer's payload: known tag 2 between unknown tags 1 and 3.
    struct Wide {
        a: i32,
        b: String,
        c: Vec<i32>,
    }

    impl Syncable for Wide {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(1, "a", &mut value.a, 0)?;
            s.field(2, "b", &mut value.b, String::new())?;
            s.list(3, "c", &mut value.c)
        }
    }

    #[derive(Default)]
    struct Narrow {
        b: String,
    }

    impl Syncable for Narrow {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(2, "b", &mut value.b, String::new())
        }
    }

    #[test]
    fn unknown_tags_are_skipped_around_known_ones() {
        let registry = fixture_registry();
        let mut wide = Wide {
            a: -7,
            b: String::from("kept"),
            c: vec![1, 2, 3],
        };
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode(&mut wide).unwrap().to_vec();

        let narrow: Narrow = BinaryReader::new(&registry).decode(&bytes).unwrap();
        assert_eq!(narrow.b, "kept");
    }

    #[test]
    fn decode_replaces_mismatched_subtype() {
        let registry = fixture_registry();
        let mut on_wire = Inventory {
            main_hand: Some(Box::new(Sword {
                base: GearBase { durability: 10 },
                damage: 9,
            })),
            ..Inventory::default()
        };
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode(&mut on_wire).unwrap().to_vec();

        let mut target = Inventory {
            main_hand: Some(Box::new(Shield {
                base: GearBase { durability: 99 },
                block: 5,
            })),
            ..Inventory::default()
        };
        BinaryReader::new(&registry)
            .decode_into(&bytes, &mut target)
            .unwrap();
        let main_hand = target.main_hand.as_ref().unwrap();
        let sword = main_hand.as_any().downcast_ref::<Sword>().unwrap();
        // fresh instance, not a merge into the old shield
        assert_eq!(sword.damage, 9);
        assert_eq!(sword.base.durability, 10);
    }

    #[test]
    fn global_frame_round_trips_without_type_knowledge() {
        let registry = fixture_registry();
        let mut gear: Box<dyn Gear> = Box::new(Sword {
            base: GearBase { durability: 3 },
            damage: 4,
        });
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode_global::<dyn Gear>(&mut *gear).unwrap().to_vec();

        let value = BinaryReader::new(&registry).decode_global(&bytes).unwrap();
        assert_eq!(value.global_id(), GEAR_GLOBAL_ID);
        assert_eq!(value.type_name(), "Sword");
        assert!(value.is::<dyn Gear>());
        let node = value.take_root::<dyn Gear>().unwrap();
        let sword = node.as_any().downcast_ref::<Sword>().unwrap();
        assert_eq!(sword.damage, 4);

        let typed = BinaryReader::new(&registry)
            .decode_root::<dyn Gear>(&bytes)
            .unwrap();
        assert_eq!(
            typed.as_any().downcast_ref::<Sword>().unwrap().base.durability,
            3
        );
    }

    #[test]
    fn truncated_and_trailing_payloads_are_fatal() {
        let registry = fixture_registry();
        let mut item = Item {
            name: String::from("Sword"),
            ..Item::default()
        };
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode(&mut item).unwrap().to_vec();
        let reader = BinaryReader::new(&registry);

        assert!(matches!(
            reader.decode::<Item>(&bytes[..bytes.len() - 3]),
            Err(SyncError::Malformed { .. })
        ));

        let mut trailing = bytes.clone();
        trailing.push(0xFF);
        assert!(matches!(
            reader.decode::<Item>(&trailing),
            Err(SyncError::Malformed {
                kind: MalformedKind::TrailingBytes,
                ..
            })
        ));
    }

    #[test]
    fn unknown_subtype_tag_is_fatal() {
        let registry = fixture_registry();
        let mut gear: Box<dyn Gear> = Box::new(Shield::default());
        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode_global::<dyn Gear>(&mut *gear).unwrap().to_vec();

        // the subtype tag sits right after the 0x05 marker and the global id
        let mut poisoned = bytes.clone();
        poisoned[2] = 63;
        assert!(matches!(
            BinaryReader::new(&registry).decode_global(&poisoned),
            Err(SyncError::UnknownSubtypeTag { tag: 63, .. })
        ));
    }
}
