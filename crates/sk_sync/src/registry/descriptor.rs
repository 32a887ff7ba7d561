use std::any::{Any, TypeId};

use sk_utils::TypeIdMap;
use sk_utils::hash::HashMap;

use crate::error::SyncResult;
use crate::sync::Syncer;
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// TypeDescriptor

/// Per-type schema facts, created once at registration and immutable after.
///
/// The type's traversal logic is not stored here — it is the type's
/// [`Syncable::sync`](crate::sync::Syncable::sync) delegate, reached
/// statically or through [`PolySync`](crate::sync::PolySync). The descriptor
/// carries what the delegate cannot: the registered display name and, for
/// globally addressable roots, the global ID.
#[derive(Debug, Clone, Copy)]
pub struct TypeDescriptor {
    name: &'static str,
    category: WireCategory,
    global_id: Option<u32>,
}

impl TypeDescriptor {
    pub(crate) fn new(name: &'static str, category: WireCategory) -> Self {
        Self {
            name,
            category,
            global_id: None,
        }
    }

    pub(crate) fn set_global_id(&mut self, global_id: u32) {
        self.global_id = Some(global_id);
    }

    /// The display name the type was registered under.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The wire category every field of this type uses.
    #[inline]
    pub fn category(&self) -> WireCategory {
        self.category
    }

    /// The global ID, for roots registered in the global type table.
    #[inline]
    pub fn global_id(&self) -> Option<u32> {
        self.global_id
    }
}

// -----------------------------------------------------------------------------
// Subtype tables

/// Type-erased factory: the produced `Box<dyn Any>` holds a `Box<R>` for the
/// table's root `R`, so a single downcast recovers the typed handle.
pub(crate) type ErasedFactory = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// Type-erased delegate dispatch for one root: downcasts `&mut dyn Any` to
/// `&mut Box<R>` and drives the node's fields.
pub(crate) type ErasedSync = fn(&mut dyn Any, &mut (dyn Syncer + '_)) -> SyncResult<()>;

pub(crate) struct SubtypeEntry {
    pub name: &'static str,
    pub type_id: TypeId,
    pub make: ErasedFactory,
}

/// The dispatch table of one polymorphic root.
///
/// Tag 0 always denotes the root's own base type; `make_base` is present
/// only when that base is itself instantiable. Lookups go three ways: tag
/// to entry (wire decode), concrete `TypeId` to tag (wire encode) and
/// display name to tag (the JSON wrapper).
pub(crate) struct SubtypeTable {
    pub root_name: &'static str,
    pub global_id: Option<u32>,
    pub make_base: Option<ErasedFactory>,
    pub sync_boxed: ErasedSync,
    pub entries: HashMap<u32, SubtypeEntry>,
    pub tags_by_type: TypeIdMap<u32>,
    pub tags_by_name: HashMap<&'static str, u32>,
}

impl SubtypeTable {
    pub(crate) fn new(root_name: &'static str, sync_boxed: ErasedSync) -> Self {
        Self {
            root_name,
            global_id: None,
            make_base: None,
            sync_boxed,
            entries: HashMap::default(),
            tags_by_type: TypeIdMap::default(),
            tags_by_name: HashMap::default(),
        }
    }

    /// The display name for a tag: the root's own name for tag 0, the
    /// subtype's registered name otherwise.
    pub(crate) fn name_of(&self, tag: u32) -> Option<&'static str> {
        if tag == 0 {
            return Some(self.root_name);
        }
        self.entries.get(&tag).map(|entry| entry.name)
    }

    /// Whether a wire tag is resolvable against this table.
    pub(crate) fn knows_tag(&self, tag: u32) -> bool {
        tag == 0 || self.entries.contains_key(&tag)
    }
}
