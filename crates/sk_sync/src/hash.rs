//! The structural hash driver: folds every present field into a fixed-seed
//! accumulator, so equal hashes track equal binary wire images.

use std::any::TypeId;
use std::hash::{BuildHasher, Hasher};

use sk_utils::hash::{FixedHashState, FixedHasher};

use crate::error::SyncResult;
use crate::registry::SchemaRegistry;
use crate::sync::{Syncable, Syncer};
use crate::wire::{WireCategory, dict_info, list_info};

/// Hashes a value's structure and contents. Deterministic across runs and
/// processes (fixed seed), and default-valued fields are elided exactly as
/// the binary codec elides them, so two values hash equal whenever their
/// wire images are byte-equal.
pub fn structural_hash<T: Syncable>(registry: &SchemaRegistry, value: &mut T) -> SyncResult<u64> {
    let mut driver = HashSyncer {
        registry,
        hasher: FixedHashState.build_hasher(),
    };
    T::sync(&mut driver, value)?;
    Ok(driver.hasher.finish())
}

// Frame sentinels keep `{a: {b: 1}}` and `{a: {}, b: 1}`-shaped values from
// colliding.
const CHILD_BEGIN: u8 = 0xB7;
const CHILD_END: u8 = 0xB8;

struct HashSyncer<'r> {
    registry: &'r SchemaRegistry,
    hasher: FixedHasher,
}

impl Syncer for HashSyncer<'_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn enter_field(
        &mut self,
        tag: u16,
        _name: &'static str,
        _category: WireCategory,
        present: bool,
    ) -> SyncResult<bool> {
        if !present {
            return Ok(false);
        }
        self.hasher.write_u16(tag);
        Ok(true)
    }

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        self.hasher.write_u8(u8::from(*value));
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        self.hasher.write_i32(*value);
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        self.hasher.write_u32(*value);
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        self.hasher.write_i64(*value);
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        self.hasher.write_u64(*value);
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        self.hasher.write_u32(value.to_bits());
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        self.hasher.write_u64(value.to_bits());
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        self.hasher.write_u64(value.len() as u64);
        self.hasher.write(value.as_bytes());
        Ok(())
    }

    fn begin_child(&mut self) -> SyncResult<()> {
        self.hasher.write_u8(CHILD_BEGIN);
        Ok(())
    }

    fn end_child(&mut self) -> SyncResult<()> {
        self.hasher.write_u8(CHILD_END);
        Ok(())
    }

    fn sync_subtype(&mut self, _root: TypeId, tag: &mut u32) -> SyncResult<()> {
        self.hasher.write_u32(*tag);
        Ok(())
    }

    fn begin_list(
        &mut self,
        len: &mut usize,
        element: WireCategory,
        nullable: bool,
    ) -> SyncResult<()> {
        self.hasher.write_u8(list_info(element, nullable));
        self.hasher.write_u64(*len as u64);
        Ok(())
    }

    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        self.hasher.write_u8(u8::from(*null));
        Ok(())
    }

    fn begin_map(
        &mut self,
        len: &mut usize,
        key: WireCategory,
        value: WireCategory,
    ) -> SyncResult<()> {
        self.hasher.write_u8(dict_info(key, value));
        self.hasher.write_u64(*len as u64);
        Ok(())
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;

    #[test]
    fn elision_makes_explicit_defaults_hash_equal() {
        let registry = fixture_registry();
        let mut fresh = Item::default();
        let mut explicit = Item {
            name: String::new(),
            count: 0,
            quality: Quality::Common,
        };
        assert_eq!(
            structural_hash(&registry, &mut fresh).unwrap(),
            structural_hash(&registry, &mut explicit).unwrap()
        );
    }

    #[test]
    fn differing_fields_hash_differently() {
        let registry = fixture_registry();
        let mut a = Item {
            name: String::from("Sword"),
            ..Item::default()
        };
        let mut b = Item {
            name: String::from("Shield"),
            ..Item::default()
        };
        let mut c = Item {
            count: 1,
            ..Item::default()
        };
        let ha = structural_hash(&registry, &mut a).unwrap();
        assert_ne!(ha, structural_hash(&registry, &mut b).unwrap());
        assert_ne!(ha, structural_hash(&registry, &mut c).unwrap());
    }

    #[test]
    fn hash_covers_polymorphic_children() {
        let registry = fixture_registry();
        let mut sword = Inventory {
            main_hand: Some(Box::new(Sword::default())),
            ..Inventory::default()
        };
        let mut shield = Inventory {
            main_hand: Some(Box::new(Shield::default())),
            ..Inventory::default()
        };
        assert_ne!(
            structural_hash(&registry, &mut sword).unwrap(),
            structural_hash(&registry, &mut shield).unwrap()
        );
    }
}
