use std::any::{Any, TypeId};
use std::mem;

use log::debug;
use sk_utils::TypeIdMap;
use sk_utils::hash::HashMap;

use crate::error::{SyncError, SyncResult};
use crate::registry::bootstrap::SchemaBootstrap;
use crate::registry::descriptor::{SubtypeEntry, SubtypeTable, TypeDescriptor};
use crate::sync::{PolySync, SyncEnum, Syncable, Syncer};
use crate::wire::WireCategory;

fn sync_boxed_shim<R: PolySync + ?Sized>(
    node: &mut dyn Any,
    s: &mut (dyn Syncer + '_),
) -> SyncResult<()> {
    match node.downcast_mut::<Box<R>>() {
        Some(node) => node.poly_sync(s),
        None => Err(SyncError::RegistrationConflict {
            detail: String::from("erased global value does not match its root type"),
        }),
    }
}

// -----------------------------------------------------------------------------
// SchemaRegistry

/// The append-only schema database every driver reads from.
///
/// Registration is expected to happen single-threaded at startup, through
/// direct calls or through [`SchemaBootstrap`] callbacks; after
/// [`ensure_bootstrapped`](Self::ensure_bootstrapped) the registry is read
/// through shared references and needs no locking. There is no unregister.
///
/// All registration operations are idempotent — repeating an identical
/// registration is a no-op, while binding an already-used global ID, subtype
/// tag or name to something *different* is an error.
///
/// # Examples
///
/// ```
/// use sk_sync::{SchemaRegistry, SyncOps, SyncResult, Syncable, Syncer, WireCategory};
///
/// #[derive(Default, PartialEq, Debug)]
/// struct Item {
///     name: String,
/// }
///
/// impl Syncable for Item {
///     const CATEGORY: WireCategory = WireCategory::Child;
///
///     fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
///         s.field(1, "name", &mut value.name, String::new())
///     }
/// }
///
/// let mut registry = SchemaRegistry::new();
/// registry.register_concrete_root::<Item>(9, "Item").unwrap();
/// assert_eq!(registry.global_root(9), Some(std::any::TypeId::of::<Item>()));
/// ```
pub struct SchemaRegistry {
    descriptors: TypeIdMap<TypeDescriptor>,
    subtypes: TypeIdMap<SubtypeTable>,
    globals: HashMap<u32, TypeId>,
    pending: Vec<SchemaBootstrap>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Creates an empty registry. With the `auto_register` feature on, every
    /// [`inventory`]-submitted bootstrap is queued as pending; nothing runs
    /// until [`ensure_bootstrapped`](Self::ensure_bootstrapped).
    pub fn new() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self {
            descriptors: TypeIdMap::default(),
            subtypes: TypeIdMap::default(),
            globals: HashMap::default(),
            pending: Vec::new(),
        };
        #[cfg(feature = "auto_register")]
        registry
            .pending
            .extend(inventory::iter::<SchemaBootstrap>.into_iter().copied());
        registry
    }

    /// Queues a bootstrap callback. It runs on the next
    /// [`ensure_bootstrapped`](Self::ensure_bootstrapped).
    pub fn add_bootstrap(&mut self, bootstrap: SchemaBootstrap) {
        self.pending.push(bootstrap);
    }

    /// Runs every pending bootstrap exactly once, including bootstraps
    /// queued by other bootstraps. Safe to call from multiple sites; later
    /// calls with nothing pending are no-ops.
    pub fn ensure_bootstrapped(&mut self) -> SyncResult<()> {
        while !self.pending.is_empty() {
            for bootstrap in mem::take(&mut self.pending) {
                debug!("running schema bootstrap `{}`", bootstrap.name());
                bootstrap.run(self)?;
            }
        }
        Ok(())
    }

    /// Descriptor lookup on a mutable path: any pending bootstraps run
    /// first, so late-queued registrations are visible before the lookup
    /// can fail.
    pub fn descriptor_of<T: Syncable>(&mut self) -> SyncResult<&TypeDescriptor> {
        self.ensure_bootstrapped()?;
        self.descriptors
            .get(&TypeId::of::<T>())
            .ok_or_else(|| SyncError::UnregisteredType {
                type_name: std::any::type_name::<T>().into(),
            })
    }

    // -------------------------------------------------------------------------
    // Registration

    /// Registers a composite or scalar type under a display name.
    pub fn register<T: Syncable>(&mut self, name: &'static str) -> SyncResult<()> {
        self.insert_descriptor(TypeId::of::<T>(), name, T::CATEGORY)
    }

    /// Registers an int-backed enum under a display name.
    pub fn register_enum<E: SyncEnum>(&mut self, name: &'static str) -> SyncResult<()> {
        self.insert_descriptor(TypeId::of::<E>(), name, WireCategory::VarInt)
    }

    /// Registers a polymorphic root `R` (typically a `dyn Trait`) under a
    /// global ID. The root's subtype table may already hold subtypes —
    /// subtype-before-root registration order is accepted.
    pub fn register_root<R: PolySync + ?Sized>(
        &mut self,
        global_id: u32,
        root_name: &'static str,
    ) -> SyncResult<()> {
        let root = TypeId::of::<R>();
        self.ensure_table::<R>();
        match self.globals.get(&global_id) {
            Some(bound) if *bound == root => {}
            Some(bound) => {
                let existing = self
                    .subtypes
                    .get(bound)
                    .map(|table| table.root_name)
                    .unwrap_or("?");
                return Err(SyncError::GlobalIdConflict {
                    global_id,
                    existing: existing.into(),
                    incoming: root_name.into(),
                });
            }
            None => {
                debug!("registered global root `{root_name}` under id {global_id}");
                self.globals.insert(global_id, root);
            }
        }
        if let Some(table) = self.subtypes.get_mut(&root) {
            if let Some(bound) = table.global_id {
                if bound != global_id {
                    return Err(SyncError::RegistrationConflict {
                        detail: format!(
                            "root `{root_name}` is already bound to global id {bound}"
                        ),
                    });
                }
                // the provisional table name is only overwritten on the
                // first registration; a repeat must match it
                if table.root_name != root_name {
                    return Err(SyncError::RegistrationConflict {
                        detail: format!(
                            "root is already registered as `{}`, cannot re-register as `{root_name}`",
                            table.root_name
                        ),
                    });
                }
            }
            table.root_name = root_name;
            table.global_id = Some(global_id);
        }
        if let Some(descriptor) = self.descriptors.get_mut(&root) {
            descriptor.set_global_id(global_id);
        }
        Ok(())
    }

    /// Supplies the tag-0 factory of root `R`, making the base type itself
    /// instantiable on decode. Without it, decoding tag 0 under `R` is an
    /// ambiguous-root error.
    pub fn register_root_base<R: PolySync + ?Sized>(
        &mut self,
        make: impl Fn() -> Box<R> + Send + Sync + 'static,
    ) -> SyncResult<()> {
        self.ensure_table::<R>();
        if let Some(table) = self.subtypes.get_mut(&TypeId::of::<R>()) {
            table.make_base = Some(Box::new(move || Box::new(make())));
        }
        Ok(())
    }

    /// Registers a plain struct as its own global root: descriptor, global
    /// ID and a tag-0 `Default` factory in one call.
    pub fn register_concrete_root<R: Syncable + Default>(
        &mut self,
        global_id: u32,
        name: &'static str,
    ) -> SyncResult<()> {
        self.register::<R>(name)?;
        self.register_root::<R>(global_id, name)?;
        self.register_root_base::<R>(|| Box::new(R::default()))?;
        if let Some(table) = self.subtypes.get_mut(&TypeId::of::<R>()) {
            table.tags_by_type.try_insert(TypeId::of::<R>(), || 0);
        }
        Ok(())
    }

    /// Registers concrete type `T` as a subtype of root `R` under a nonzero
    /// tag. `make` produces a fresh default instance already widened to the
    /// root handle, e.g. `|| Box::new(Sword::default())`.
    ///
    /// The root itself may be registered later; the table is created on
    /// first use.
    pub fn register_subtype<R, T>(
        &mut self,
        tag: u32,
        name: &'static str,
        make: impl Fn() -> Box<R> + Send + Sync + 'static,
    ) -> SyncResult<()>
    where
        R: PolySync + ?Sized,
        T: Syncable,
    {
        let root = TypeId::of::<R>();
        self.ensure_table::<R>();
        if tag == 0 {
            let root_name = self.root_name(root).unwrap_or("?");
            return Err(SyncError::ReservedSubtypeTag {
                root: root_name.into(),
            });
        }
        self.register::<T>(name)?;
        let Some(table) = self.subtypes.get_mut(&root) else {
            return Err(SyncError::RegistrationConflict {
                detail: format!("no subtype table for root of `{name}`"),
            });
        };
        if let Some(existing) = table.entries.get(&tag) {
            if existing.type_id == TypeId::of::<T>() && existing.name == name {
                return Ok(());
            }
            return Err(SyncError::SubtypeTagConflict {
                root: table.root_name.into(),
                tag,
                existing: existing.name.into(),
                incoming: name.into(),
            });
        }
        if let Some(other) = table.tags_by_name.get(name) {
            if *other != tag {
                return Err(SyncError::RegistrationConflict {
                    detail: format!(
                        "subtype name `{name}` of `{}` is already bound to tag {other}",
                        table.root_name
                    ),
                });
            }
        }
        debug!("registered subtype `{name}` (tag {tag}) of `{}`", table.root_name);
        table.entries.insert(
            tag,
            SubtypeEntry {
                name,
                type_id: TypeId::of::<T>(),
                make: Box::new(move || Box::new(make())),
            },
        );
        table.tags_by_type.insert(TypeId::of::<T>(), tag);
        table.tags_by_name.insert(name, tag);
        Ok(())
    }

    fn ensure_table<R: PolySync + ?Sized>(&mut self) {
        self.subtypes.try_insert(TypeId::of::<R>(), || {
            SubtypeTable::new(std::any::type_name::<R>(), sync_boxed_shim::<R>)
        });
    }

    fn insert_descriptor(
        &mut self,
        type_id: TypeId,
        name: &'static str,
        category: WireCategory,
    ) -> SyncResult<()> {
        if let Some(existing) = self.descriptors.get(&type_id) {
            if existing.name() == name && existing.category() == category {
                return Ok(());
            }
            return Err(SyncError::RegistrationConflict {
                detail: format!(
                    "type is already registered as `{}`, cannot re-register as `{name}`",
                    existing.name()
                ),
            });
        }
        debug!("registered type `{name}`");
        self.descriptors
            .insert(type_id, TypeDescriptor::new(name, category));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lookups

    /// The descriptor of a registered type.
    pub fn descriptor(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.descriptors.get(&type_id)
    }

    /// The registered display name of a type.
    pub fn type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.descriptors.get(&type_id).map(TypeDescriptor::name)
    }

    /// The subtype tag a concrete type travels under for the given root
    /// (0 when the concrete type *is* the root).
    pub fn subtype_tag(&self, root: TypeId, concrete: TypeId) -> Option<u32> {
        if root == concrete {
            return Some(0);
        }
        self.subtypes
            .get(&root)?
            .tags_by_type
            .get(&concrete)
            .copied()
    }

    /// The display name behind a subtype tag of a root.
    pub fn subtype_name(&self, root: TypeId, tag: u32) -> Option<&'static str> {
        self.subtypes.get(&root)?.name_of(tag)
    }

    /// The tag behind a subtype display name of a root (the root's own name
    /// maps to 0).
    pub fn subtype_tag_by_name(&self, root: TypeId, name: &str) -> Option<u32> {
        let table = self.subtypes.get(&root)?;
        if name == table.root_name {
            return Some(0);
        }
        table.tags_by_name.get(name).copied()
    }

    /// Whether a wire tag resolves against the root's subtype table.
    pub fn knows_subtype(&self, root: TypeId, tag: u32) -> bool {
        self.subtypes
            .get(&root)
            .is_some_and(|table| table.knows_tag(tag))
    }

    /// The registered display name of a root.
    pub fn root_name(&self, root: TypeId) -> Option<&'static str> {
        self.subtypes.get(&root).map(|table| table.root_name)
    }

    /// The root type bound to a global ID.
    pub fn global_root(&self, global_id: u32) -> Option<TypeId> {
        self.globals.get(&global_id).copied()
    }

    /// The global ID a root is bound to.
    pub fn global_of(&self, root: TypeId) -> Option<u32> {
        self.subtypes.get(&root)?.global_id
    }

    /// Instantiates a fresh default value for a subtype tag of root `R`.
    /// Tag 0 requires a registered base factory.
    pub fn instantiate_subtype<R: ?Sized + 'static>(&self, tag: u32) -> SyncResult<Box<R>> {
        let root = TypeId::of::<R>();
        let (node, _) = self.instantiate_erased(root, tag)?;
        match node.downcast::<Box<R>>() {
            Ok(node) => Ok(*node),
            Err(_) => Err(SyncError::RegistrationConflict {
                detail: format!(
                    "subtype table of `{}` holds a factory for a different root",
                    self.root_name(root).unwrap_or("?")
                ),
            }),
        }
    }

    /// Type-erased variant of [`instantiate_subtype`](Self::instantiate_subtype):
    /// the box holds a `Box<R>` for the table's root, plus the display name.
    pub(crate) fn instantiate_erased(
        &self,
        root: TypeId,
        tag: u32,
    ) -> SyncResult<(Box<dyn Any>, &'static str)> {
        let table = self.subtypes.get(&root).ok_or(SyncError::UnregisteredType {
            type_name: "unregistered polymorphic root".into(),
        })?;
        if tag == 0 {
            let make = table.make_base.as_ref().ok_or(SyncError::AmbiguousRoot {
                root: table.root_name.into(),
            })?;
            return Ok((make(), table.root_name));
        }
        let entry = table.entries.get(&tag).ok_or(SyncError::UnknownSubtypeTag {
            root: table.root_name.into(),
            tag,
            path: String::new(),
        })?;
        Ok(((entry.make)(), entry.name))
    }

    /// Drives an erased global value's fields through a driver.
    pub(crate) fn sync_erased(
        &self,
        root: TypeId,
        node: &mut dyn Any,
        s: &mut (dyn Syncer + '_),
    ) -> SyncResult<()> {
        let table = self.subtypes.get(&root).ok_or(SyncError::UnregisteredType {
            type_name: "unregistered polymorphic root".into(),
        })?;
        (table.sync_boxed)(node, s)
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::any::TypeId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::SyncOps;

    #[derive(Default, PartialEq, Debug)]
    struct Widget {
        label: String,
    }

    impl Syncable for Widget {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(1, "label", &mut value.label, String::new())
        }
    }

    #[derive(Default, PartialEq, Debug)]
    struct Gadget {
        power: i32,
    }

    impl Syncable for Gadget {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(1, "power", &mut value.power, 0)
        }
    }

    trait Part: PolySync {}
    impl Part for Widget {}
    impl Part for Gadget {}

    #[test]
    fn registration_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Widget>("Widget").unwrap();
        registry.register::<Widget>("Widget").unwrap();
        assert!(registry.register::<Widget>("Renamed").is_err());
    }

    #[test]
    fn global_ids_are_bijective() {
        let mut registry = SchemaRegistry::new();
        registry.register_concrete_root::<Widget>(7, "Widget").unwrap();
        registry.register_concrete_root::<Widget>(7, "Widget").unwrap();
        let err = registry.register_concrete_root::<Gadget>(7, "Gadget");
        assert!(matches!(
            err,
            Err(SyncError::GlobalIdConflict { global_id: 7, .. })
        ));
        assert_eq!(registry.global_root(7), Some(TypeId::of::<Widget>()));
        assert_eq!(registry.global_of(TypeId::of::<Widget>()), Some(7));
    }

    #[test]
    fn subtype_tags_conflict_and_reserve_zero() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_subtype::<dyn Part, Widget>(1, "Widget", || Box::new(Widget::default()))
            .unwrap();
        // same binding again is fine
        registry
            .register_subtype::<dyn Part, Widget>(1, "Widget", || Box::new(Widget::default()))
            .unwrap();
        assert!(matches!(
            registry.register_subtype::<dyn Part, Gadget>(1, "Gadget", || Box::new(
                Gadget::default()
            )),
            Err(SyncError::SubtypeTagConflict { tag: 1, .. })
        ));
        assert!(matches!(
            registry.register_subtype::<dyn Part, Gadget>(0, "Gadget", || Box::new(
                Gadget::default()
            )),
            Err(SyncError::ReservedSubtypeTag { .. })
        ));
        // root registered after its subtypes
        registry.register_root::<dyn Part>(3, "Part").unwrap();
        registry.register_root::<dyn Part>(3, "Part").unwrap();
        assert!(matches!(
            registry.register_root::<dyn Part>(3, "Renamed"),
            Err(SyncError::RegistrationConflict { .. })
        ));
        assert_eq!(
            registry.subtype_tag(TypeId::of::<dyn Part>(), TypeId::of::<Widget>()),
            Some(1)
        );
        assert_eq!(
            registry.subtype_name(TypeId::of::<dyn Part>(), 0),
            Some("Part")
        );
    }

    #[test]
    fn instantiate_dispatches_by_tag() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_subtype::<dyn Part, Gadget>(2, "Gadget", || Box::new(Gadget::default()))
            .unwrap();
        registry.register_root::<dyn Part>(3, "Part").unwrap();
        let node = registry.instantiate_subtype::<dyn Part>(2).unwrap();
        assert_eq!(node.poly_type_id(), TypeId::of::<Gadget>());
        assert!(matches!(
            registry.instantiate_subtype::<dyn Part>(9),
            Err(SyncError::UnknownSubtypeTag { tag: 9, .. })
        ));
        assert!(matches!(
            registry.instantiate_subtype::<dyn Part>(0),
            Err(SyncError::AmbiguousRoot { .. })
        ));
    }

    #[test]
    fn bootstraps_run_exactly_once() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);

        fn install(registry: &mut SchemaRegistry) -> SyncResult<()> {
            RUNS.fetch_add(1, Ordering::SeqCst);
            registry.register::<Widget>("Widget")
        }

        let mut registry = SchemaRegistry::new();
        registry.add_bootstrap(SchemaBootstrap::new("widgets", install));
        registry.ensure_bootstrapped().unwrap();
        registry.ensure_bootstrapped().unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
        assert_eq!(
            registry.type_name(TypeId::of::<Widget>()),
            Some("Widget")
        );

        // a mutable lookup drains pending bootstraps before it can fail
        let mut lazy = SchemaRegistry::new();
        lazy.add_bootstrap(SchemaBootstrap::new("widgets", install));
        assert_eq!(lazy.descriptor_of::<Widget>().unwrap().name(), "Widget");
        assert_eq!(RUNS.load(Ordering::SeqCst), 2);
        assert!(matches!(
            lazy.descriptor_of::<Gadget>(),
            Err(SyncError::UnregisteredType { .. })
        ));
    }
}
