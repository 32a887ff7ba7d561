//! Shared scenario types for the crate's tests: a small inventory schema
//! exercising scalars, enums, lists, dictionaries, polymorphic gear and
//! references.

use sk_utils::hash::HashMap;

use crate::error::SyncResult;
use crate::refs::Ref;
use crate::registry::SchemaRegistry;
use crate::sync::{PolySync, SyncEnum, SyncOps, Syncable, Syncer};
use crate::wire::WireCategory;

pub(crate) const GEAR_GLOBAL_ID: u32 = 7;
pub(crate) const ITEM_GLOBAL_ID: u32 = 9;

// -----------------------------------------------------------------------------
// Types

#[derive(Default, Clone, PartialEq, Debug)]
pub(crate) struct Item {
    pub name: String,
    pub count: i32,
    pub quality: Quality,
}

impl Syncable for Item {
    const CATEGORY: WireCategory = WireCategory::Child;

    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
        s.field(1, "name", &mut value.name, String::new())?;
        s.field(2, "count", &mut value.count, 0)?;
        s.enum_field(3, "quality", &mut value.quality, Quality::Common)
    }
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Quality {
    #[default]
    Common,
    Rare,
    Epic,
}

impl SyncEnum for Quality {
    const NAME: &'static str = "Quality";

    fn to_index(self) -> i32 {
        match self {
            Self::Common => 0,
            Self::Rare => 1,
            Self::Epic => 2,
        }
    }

    fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Common),
            1 => Some(Self::Rare),
            2 => Some(Self::Epic),
            _ => None,
        }
    }
}

pub(crate) trait Gear: PolySync {}

/// Base-struct slice embedded by every gear subtype; shares the owner's
/// tag space starting at 1.
#[derive(Default, Clone, PartialEq, Debug)]
pub(crate) struct GearBase {
    pub durability: i32,
}

impl Syncable for GearBase {
    const CATEGORY: WireCategory = WireCategory::Child;

    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
        s.field(1, "durability", &mut value.durability, 0)
    }
}

#[derive(Default, Clone, PartialEq, Debug)]
pub(crate) struct Sword {
    pub base: GearBase,
    pub damage: i32,
}

impl Syncable for Sword {
    const CATEGORY: WireCategory = WireCategory::Child;

    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
        s.base(&mut value.base)?;
        s.field(2, "damage", &mut value.damage, 0)
    }
}

impl Gear for Sword {}

#[derive(Default, Clone, PartialEq, Debug)]
pub(crate) struct Shield {
    pub base: GearBase,
    pub block: i32,
}

impl Syncable for Shield {
    const CATEGORY: WireCategory = WireCategory::Child;

    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
        s.base(&mut value.base)?;
        s.field(2, "block", &mut value.block, 0)
    }
}

impl Gear for Shield {}

#[derive(Default)]
pub(crate) struct Inventory {
    pub owner: String,
    pub items: Vec<Item>,
    pub slots: Vec<Option<Item>>,
    pub counts: HashMap<String, i32>,
    pub main_hand: Option<Box<dyn Gear>>,
    pub gold: u64,
    pub emblem: Ref<Item>,
}

impl Syncable for Inventory {
    const CATEGORY: WireCategory = WireCategory::Child;

    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
        s.field(1, "owner", &mut value.owner, String::new())?;
        s.list(2, "items", &mut value.items)?;
        s.list_opt(3, "slots", &mut value.slots)?;
        s.map(4, "counts", &mut value.counts)?;
        s.poly::<dyn Gear>(5, "main_hand", &mut value.main_hand)?;
        s.field(6, "gold", &mut value.gold, 0)?;
        s.reference(7, "emblem", &mut value.emblem)
    }
}

// -----------------------------------------------------------------------------
// Registry

pub(crate) fn fixture_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register::<GearBase>("GearBase").unwrap();
    registry.register_enum::<Quality>("Quality").unwrap();
    registry
        .register_subtype::<dyn Gear, Sword>(1, "Sword", || Box::new(Sword::default()))
        .unwrap();
    registry
        .register_subtype::<dyn Gear, Shield>(2, "Shield", || Box::new(Shield::default()))
        .unwrap();
    registry
        .register_root::<dyn Gear>(GEAR_GLOBAL_ID, "Gear")
        .unwrap();
    registry
        .register_concrete_root::<Item>(ITEM_GLOBAL_ID, "Item")
        .unwrap();
    registry.register::<Inventory>("Inventory").unwrap();
    registry
}
