//! The JSON codec: a byte-exact writer and a flat-token reader driving the
//! same delegates as the binary codec, keyed by field name instead of tag.

mod reader;
mod tokenizer;
mod writer;

pub use reader::JsonReader;
pub use writer::JsonWriter;

/// Reserved wrapper key naming the concrete type of a polymorphic or global
/// value, formatted `"<global id>:<type name>"`. Rejected as an ordinary
/// field name by every driver.
pub const GLOBAL_TYPE_KEY: &str = "-globalType";

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::fixture::*;

    #[test]
    fn golden_item() {
        let registry = fixture_registry();
        let mut writer = JsonWriter::new(&registry);
        let mut item = Item {
            name: String::from("Sword"),
            ..Item::default()
        };
        assert_eq!(
            writer.encode(&mut item).unwrap(),
            "{\n\t\"name\": \"Sword\"\n}"
        );
        assert_eq!(writer.encode(&mut Item::default()).unwrap(), "{}");
    }

    #[test]
    fn output_is_valid_json() {
        let registry = fixture_registry();
        let mut inventory = Inventory {
            owner: String::from("Asha \"the\tswift\""),
            items: vec![Item {
                name: String::from("Sword"),
                count: 2,
                quality: Quality::Epic,
            }],
            slots: vec![None, Some(Item::default())],
            counts: [(String::from("gems"), 4)].into_iter().collect(),
            main_hand: Some(Box::new(Shield {
                base: GearBase { durability: 7 },
                block: 3,
            })),
            gold: 12,
            ..Inventory::default()
        };
        let mut writer = JsonWriter::new(&registry);
        let text = writer.encode(&mut inventory).unwrap().to_owned();

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["owner"], "Asha \"the\tswift\"");
        assert_eq!(parsed["items"][0]["count"], 2);
        assert_eq!(parsed["items"][0]["quality"], 2);
        assert_eq!(parsed["slots"][0], serde_json::Value::Null);
        assert_eq!(parsed["counts"]["gems"], 4);
        assert_eq!(parsed["main_hand"]["-globalType"], "7:Shield");
        assert_eq!(parsed["main_hand"]["block"], 3);
        assert_eq!(parsed["gold"], 12);
    }

    #[test]
    fn round_trips_through_text() {
        let registry = fixture_registry();
        let mut inventory = Inventory {
            owner: String::from("Brin"),
            items: vec![
                Item {
                    name: String::from("Bow"),
                    count: 1,
                    quality: Quality::Rare,
                },
                Item::default(),
            ],
            slots: vec![Some(Item::default()), None],
            counts: [(String::from("arrows"), 30), (String::from("gems"), 2)]
                .into_iter()
                .collect(),
            main_hand: Some(Box::new(Sword {
                base: GearBase { durability: 55 },
                damage: 9,
            })),
            gold: 640,
            ..Inventory::default()
        };
        let mut writer = JsonWriter::new(&registry);
        let text = writer.encode(&mut inventory).unwrap().to_owned();

        let decoded: Inventory = JsonReader::new(&registry).decode(&text).unwrap();
        assert_eq!(decoded.owner, "Brin");
        assert_eq!(decoded.items, inventory.items);
        assert_eq!(decoded.slots, inventory.slots);
        assert_eq!(decoded.counts, inventory.counts);
        assert_eq!(decoded.gold, 640);
        let sword = decoded
            .main_hand
            .as_ref()
            .unwrap()
            .as_any()
            .downcast_ref::<Sword>()
            .unwrap();
        assert_eq!(sword.damage, 9);
        assert_eq!(sword.base.durability, 55);
    }

    #[test]
    fn unknown_members_are_ignored() {
        let registry = fixture_registry();
        let text = "{\n\t\"future\": {\"x\": [1, 2]},\n\t\"name\": \"Axe\"\n}";
        let item: Item = JsonReader::new(&registry).decode(text).unwrap();
        assert_eq!(item.name, "Axe");
    }

    #[test]
    fn global_wrapper_round_trips() {
        let registry = fixture_registry();
        let mut gear: Box<dyn Gear> = Box::new(Sword {
            base: GearBase { durability: 1 },
            damage: 2,
        });
        let mut writer = JsonWriter::new(&registry);
        let text = writer.encode_global::<dyn Gear>(&mut *gear).unwrap().to_owned();
        assert!(text.starts_with("{\n\t\"-globalType\": \"7:Sword\""));

        let value = JsonReader::new(&registry).decode_global(&text).unwrap();
        assert_eq!(value.global_id(), GEAR_GLOBAL_ID);
        assert_eq!(value.type_name(), "Sword");

        let typed = JsonReader::new(&registry)
            .decode_root::<dyn Gear>(&text)
            .unwrap();
        assert_eq!(typed.as_any().downcast_ref::<Sword>().unwrap().damage, 2);
    }

    #[test]
    fn missing_wrapper_is_ambiguous_for_trait_roots() {
        let registry = fixture_registry();
        assert!(matches!(
            JsonReader::new(&registry).decode_root::<dyn Gear>("{}"),
            Err(SyncError::AmbiguousRoot { .. })
        ));
        assert!(matches!(
            JsonReader::new(&registry).decode_global("{}"),
            Err(SyncError::AmbiguousRoot { .. })
        ));
    }

    #[test]
    fn unknown_subtype_name_is_fatal() {
        let registry = fixture_registry();
        let text = "{\n\t\"-globalType\": \"7:Halberd\"\n}";
        assert!(matches!(
            JsonReader::new(&registry).decode_global(text),
            Err(SyncError::UnknownSubtypeName { .. })
        ));
    }

    #[test]
    fn malformed_documents_carry_offsets() {
        let registry = fixture_registry();
        let result = JsonReader::new(&registry).decode::<Item>("{\"name\": }");
        assert!(matches!(result, Err(SyncError::MalformedJson { .. })));
    }
}
