//! The heterogeneous reference pack: many referencable instances of many
//! root families in one payload.
//!
//! Layout: varint family count, then per family a varint global ID, a
//! varint instance count and the instances themselves (each a subtype tag,
//! fields and end marker, exactly the body of a global frame). Families are
//! written in ascending global-ID order so output is deterministic.

use std::collections::BTreeMap;

use crate::binary::{BinaryReader, BinaryWriter, push_varint};
use crate::error::{SyncError, SyncResult};
use crate::registry::GlobalValue;

impl BinaryWriter<'_> {
    /// Encodes a batch of global values grouped by root family.
    pub fn encode_pack(&mut self, values: &mut [GlobalValue]) -> SyncResult<&[u8]> {
        let mut families: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, value) in values.iter().enumerate() {
            families.entry(value.global_id()).or_default().push(index);
        }
        self.reset();
        push_varint(&mut self.buf, families.len() as u64);
        for (global_id, members) in families {
            push_varint(&mut self.buf, u64::from(global_id));
            push_varint(&mut self.buf, members.len() as u64);
            for index in members {
                let value = &mut values[index];
                let root = value.root_type_id();
                let tag = value.subtype_tag();
                self.write_instance(root, value.node_mut(), tag)?;
            }
        }
        Ok(&self.buf)
    }
}

impl BinaryReader<'_> {
    /// Decodes a reference pack into its global values, in wire order.
    pub fn decode_pack(&self, data: &[u8]) -> SyncResult<Vec<GlobalValue>> {
        let mut driver = self.driver(data);
        let families = driver.read_count()?;
        let mut values = Vec::new();
        for _ in 0..families {
            let global_id = driver.read_global_id()?;
            let root = driver
                .registry()
                .global_root(global_id)
                .ok_or(SyncError::UnknownGlobalId { global_id })?;
            let instances = driver.read_count()?;
            for _ in 0..instances {
                values.push(driver.read_instance(global_id, root)?);
            }
        }
        driver.expect_eof()?;
        Ok(values)
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;
    use crate::registry::SchemaRegistry;

    fn global_of<T: crate::sync::PolySync + ?Sized>(
        registry: &SchemaRegistry,
        value: &mut T,
    ) -> GlobalValue {
        let mut writer = BinaryWriter::new(registry);
        let bytes = writer.encode_global(value).unwrap().to_vec();
        BinaryReader::new(registry).decode_global(&bytes).unwrap()
    }

    #[test]
    fn pack_round_trips_heterogeneous_families() {
        let registry = fixture_registry();
        let mut sword = Sword {
            base: GearBase { durability: 5 },
            damage: 8,
        };
        let mut shield = Shield {
            base: GearBase { durability: 6 },
            block: 2,
        };
        let mut item = Item {
            name: String::from("Gem"),
            count: 4,
            quality: Quality::Rare,
        };
        let mut values = vec![
            global_of::<dyn Gear>(&registry, &mut sword),
            global_of::<Item>(&registry, &mut item),
            global_of::<dyn Gear>(&registry, &mut shield),
        ];

        let mut writer = BinaryWriter::new(&registry);
        let bytes = writer.encode_pack(&mut values).unwrap().to_vec();

        let decoded = BinaryReader::new(&registry).decode_pack(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        // families are grouped and ordered by global id: Gear (7) then Item (9)
        assert_eq!(decoded[0].global_id(), GEAR_GLOBAL_ID);
        assert_eq!(decoded[1].global_id(), GEAR_GLOBAL_ID);
        assert_eq!(decoded[2].global_id(), ITEM_GLOBAL_ID);
        let gear = decoded[0].root_ref::<dyn Gear>().unwrap();
        assert_eq!(gear.as_any().downcast_ref::<Sword>().unwrap().damage, 8);
        let shield = decoded[1].root_ref::<dyn Gear>().unwrap();
        assert_eq!(shield.as_any().downcast_ref::<Shield>().unwrap().block, 2);
        let item = decoded[2].root_ref::<Item>().unwrap();
        assert_eq!(item.name, "Gem");
    }

    #[test]
    fn unknown_family_is_fatal() {
        let registry = fixture_registry();
        // one family under an unregistered global id
        let bytes = [1_u8, 100, 1, 0, 0];
        assert!(matches!(
            BinaryReader::new(&registry).decode_pack(&bytes),
            Err(SyncError::UnknownGlobalId { .. })
        ));
    }
}
