//! The pool reclaimer: the teardown traversal. Boxed polymorphic nodes are
//! detached depth-first, handed to an external [`Pool`], and their owning
//! fields nulled; collections are cleared so a reused parent cannot retain
//! stale children.

use std::any::Any;

use crate::error::SyncResult;
use crate::registry::SchemaRegistry;
use crate::sync::{Syncable, Syncer};
use crate::wire::WireCategory;

/// The external store detached nodes are returned to. The payload of each
/// box is the node's concrete type, so `Box<dyn Any>::downcast` recovers it
/// for reuse.
pub trait Pool {
    fn give(&mut self, node: Box<dyn Any>);
}

/// Detaches every boxed polymorphic node reachable from `value` into
/// `pool`, depth-first (children are detached before their parent is handed
/// over), nulling owner fields and clearing collections along the way.
pub fn reclaim<T: Syncable>(
    registry: &SchemaRegistry,
    value: &mut T,
    pool: &mut dyn Pool,
) -> SyncResult<()> {
    let mut driver = PoolSyncer { registry, pool };
    T::sync(&mut driver, value)
}

struct PoolSyncer<'r, 'p> {
    registry: &'r SchemaRegistry,
    pool: &'p mut dyn Pool,
}

impl Syncer for PoolSyncer<'_, '_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn detaching(&self) -> bool {
        true
    }

    fn enter_field(
        &mut self,
        _tag: u16,
        _name: &'static str,
        _category: WireCategory,
        present: bool,
    ) -> SyncResult<bool> {
        Ok(present)
    }

    fn reclaim(&mut self, node: Box<dyn Any>) {
        self.pool.give(node);
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;

    #[derive(Default)]
    struct Bin {
        nodes: Vec<Box<dyn Any>>,
    }

    impl Pool for Bin {
        fn give(&mut self, node: Box<dyn Any>) {
            self.nodes.push(node);
        }
    }

    #[test]
    fn reclaim_detaches_nodes_and_clears_collections() {
        let registry = fixture_registry();
        let mut inventory = Inventory {
            owner: String::from("Asha"),
            items: vec![Item::default(); 3],
            slots: vec![Some(Item::default()), None],
            counts: [(String::from("gems"), 2)].into_iter().collect(),
            main_hand: Some(Box::new(Sword {
                base: GearBase { durability: 9 },
                damage: 4,
            })),
            gold: 10,
            ..Inventory::default()
        };
        let mut bin = Bin::default();
        reclaim(&registry, &mut inventory, &mut bin).unwrap();

        assert!(inventory.main_hand.is_none());
        assert!(inventory.items.is_empty());
        assert!(inventory.slots.is_empty());
        assert!(inventory.counts.is_empty());
        // scalars are not part of teardown
        assert_eq!(inventory.owner, "Asha");
        assert_eq!(inventory.gold, 10);

        assert_eq!(bin.nodes.len(), 1);
        let sword = bin.nodes.pop().unwrap().downcast::<Sword>().unwrap();
        assert_eq!(sword.damage, 4);
    }

    #[test]
    fn reclaim_of_a_bare_value_is_a_no_op() {
        let registry = fixture_registry();
        let mut item = Item {
            name: String::from("Gem"),
            ..Item::default()
        };
        let mut bin = Bin::default();
        reclaim(&registry, &mut item, &mut bin).unwrap();
        assert!(bin.nodes.is_empty());
        assert_eq!(item.name, "Gem");
    }
}
