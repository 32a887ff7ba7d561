use std::any::{Any, TypeId};

use crate::error::SyncResult;
use crate::sync::Syncer;
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// Syncable

/// A type with a sync delegate.
///
/// Scalars are provided by this crate. Composites implement `sync` as their
/// *field list only* — the glue in [`SyncOps`](crate::sync::SyncOps) applies
/// child framing at every use site, so the same delegate also works when the
/// value appears as a list element, dictionary value or base-class slice.
///
/// Contract: fields must be declared in ascending tag order, and the
/// delegate must not mutate the value on its own — all mutation flows
/// through the driver.
///
/// # Examples
///
/// ```
/// use sk_sync::{SyncOps, SyncResult, Syncable, Syncer, WireCategory};
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
/// ```
pub trait Syncable: 'static {
    /// The wire category of this type. Every registered type keeps exactly
    /// one category for its lifetime.
    const CATEGORY: WireCategory;

    /// The sync delegate: one function, every behavior.
    fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()>;
}

macro_rules! impl_scalar_syncable {
    ($($ty:ty => $category:expr, $channel:ident;)*) => {
        $(impl Syncable for $ty {
            const CATEGORY: WireCategory = $category;

            #[inline]
            fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
                s.$channel(value)
            }
        })*
    };
}

impl_scalar_syncable! {
    bool => WireCategory::VarInt, sync_bool;
    i32 => WireCategory::VarInt, sync_i32;
    u32 => WireCategory::VarInt, sync_u32;
    i64 => WireCategory::VarInt, sync_i64;
    u64 => WireCategory::VarInt, sync_u64;
    f32 => WireCategory::Fixed32, sync_f32;
    f64 => WireCategory::Fixed64, sync_f64;
    String => WireCategory::Length, sync_string;
}

// -----------------------------------------------------------------------------
// SyncEnum

/// An int-backed enum usable in [`SyncOps::enum_field`].
///
/// Enums travel as their index in the `VarInt` category on every driver;
/// the JSON codec writes the index too, keeping both formats equivalent.
/// A decoded index with no variant is a fatal error — mapping it to a
/// default would silently lose data.
///
/// [`SyncOps::enum_field`]: crate::sync::SyncOps::enum_field
pub trait SyncEnum: Copy + PartialEq + 'static {
    /// Display name used in error messages.
    const NAME: &'static str;

    /// The wire index of this variant.
    fn to_index(self) -> i32;

    /// The variant for a wire index, if any.
    fn from_index(index: i32) -> Option<Self>;
}

// -----------------------------------------------------------------------------
// SyncKey

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for String {}
}

/// A dictionary key type. The set is closed: integers and strings.
///
/// Keys are written in sorted order so both codecs and the structural hash
/// are deterministic regardless of map iteration order.
pub trait SyncKey:
    sealed::Sealed + Default + Clone + Ord + Eq + std::hash::Hash + 'static
{
    /// The wire category of the key column.
    const CATEGORY: WireCategory;

    /// Transports one key through the driver's key position.
    fn sync_key(s: &mut (dyn Syncer + '_), key: &mut Self) -> SyncResult<()>;
}

macro_rules! impl_sync_key {
    ($($ty:ty => $category:expr, $channel:ident;)*) => {
        $(impl SyncKey for $ty {
            const CATEGORY: WireCategory = $category;

            #[inline]
            fn sync_key(s: &mut (dyn Syncer + '_), key: &mut Self) -> SyncResult<()> {
                s.$channel(key)
            }
        })*
    };
}

impl_sync_key! {
    i32 => WireCategory::VarInt, sync_i32;
    i64 => WireCategory::VarInt, sync_i64;
    u32 => WireCategory::VarInt, sync_u32;
    u64 => WireCategory::VarInt, sync_u64;
    String => WireCategory::Length, sync_string;
}

// -----------------------------------------------------------------------------
// PolySync

/// Object-safe access to a value's sync delegate.
///
/// Blanket-implemented for every [`Syncable`] type. Root traits of
/// polymorphic hierarchies declare it as a supertrait:
///
/// ```ignore
/// pub trait Gear: PolySync {}
/// ```
///
/// after which `Option<Box<dyn Gear>>` fields sync through
/// [`SyncOps::poly`](crate::sync::SyncOps::poly) and boxed values dispatch
/// to their concrete delegate without any per-type driver code.
pub trait PolySync: Any {
    /// Drives this value's fields through the driver (no framing).
    fn poly_sync(&mut self, s: &mut (dyn Syncer + '_)) -> SyncResult<()>;

    /// The concrete [`TypeId`] behind any indirection.
    fn poly_type_id(&self) -> TypeId;

    /// The concrete Rust type name, for error messages. Registered display
    /// names live in the schema registry.
    fn poly_type_name(&self) -> &'static str;

    /// Erases the box for handoff to a pool collaborator. The payload is
    /// the concrete type, so `Box<dyn Any>::downcast` works on it.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Borrows the concrete value.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrows the concrete value.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Syncable> PolySync for T {
    #[inline]
    fn poly_sync(&mut self, s: &mut (dyn Syncer + '_)) -> SyncResult<()> {
        T::sync(s, self)
    }

    #[inline]
    fn poly_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    #[inline]
    fn poly_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    #[inline]
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
