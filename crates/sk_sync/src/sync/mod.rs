//! The sync abstraction: one object-safe driver trait, one delegate per
//! type, and generic glue operations shared by every behavior.
//!
//! A type's schema is written exactly once, as its [`Syncable::sync`]
//! delegate. The delegate is direction-agnostic: the binary encoder and
//! decoder, the JSON writer and reader, the structural hasher, the pool
//! reclaimer and the generic visitor all drive the same delegate through
//! [`Syncer`], which is what keeps per-type traversal code at `N + M`
//! instead of `N × M`.

mod ops;
mod value;

pub use ops::SyncOps;
pub use value::{PolySync, SyncEnum, SyncKey, Syncable};

use std::any::{Any, TypeId};

use crate::error::SyncResult;
use crate::registry::SchemaRegistry;
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// Syncer

/// The object-safe driver interface.
///
/// Delegates never call these methods directly; they go through the typed
/// operations of [`SyncOps`], which handle default elision, presence,
/// framing and polymorphic dispatch and then feed the primitive channels
/// below. Implementations exist for the binary codec, the JSON codec, the
/// structural hasher, the pool reclaimer and the generic visitor.
///
/// A driver instance is a single-use-at-a-time reusable buffer: it may be
/// cleared and reused serially, but must never be driven by two concurrent
/// calls.
pub trait Syncer {
    /// The registry consulted for polymorphic dispatch.
    fn registry(&self) -> &SchemaRegistry;

    /// Reborrows the driver as a trait object for delegate calls.
    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_);

    /// Whether this driver materializes values from an external source.
    fn reading(&self) -> bool {
        false
    }

    /// Whether this driver tears the graph down instead of transporting it.
    fn detaching(&self) -> bool {
        false
    }

    /// Opens a keyed field. `present` is the write-direction presence (the
    /// value differs from its declared default); readers answer from their
    /// own source instead. Returns whether the value should be synced.
    fn enter_field(
        &mut self,
        tag: u16,
        name: &'static str,
        category: WireCategory,
        present: bool,
    ) -> SyncResult<bool>;

    /// Closes the field most recently entered. Called only when
    /// [`enter_field`](Self::enter_field) returned `true`.
    fn leave_field(&mut self) -> SyncResult<()> {
        Ok(())
    }

    // Scalar channels. Every channel defaults to a no-op so drivers that
    // only observe structure (visitor, reclaimer) implement none of them;
    // transporting drivers override the lot.

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        let _ = value;
        Ok(())
    }

    /// Opens a composite frame.
    fn begin_child(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Closes a composite frame. Decoders structurally skip any fields the
    /// delegate did not claim before consuming the end marker — this is the
    /// forward-compatibility path.
    fn end_child(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Transports the subtype tag of a polymorphic child. Writers emit
    /// `*tag`; readers overwrite it from the source. Called between
    /// [`begin_child`](Self::begin_child) and the first field.
    fn sync_subtype(&mut self, root: TypeId, tag: &mut u32) -> SyncResult<()> {
        let _ = (root, tag);
        Ok(())
    }

    /// Opens a list frame. Writers emit `*len`; readers overwrite it.
    fn begin_list(
        &mut self,
        len: &mut usize,
        element: WireCategory,
        nullable: bool,
    ) -> SyncResult<()> {
        let _ = (len, element, nullable);
        Ok(())
    }

    /// Closes a list frame.
    fn end_list(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Positions on the `index`-th element or entry of the open list or
    /// dictionary. Elements are visited in order, starting at 0.
    fn begin_element(&mut self, index: usize) -> SyncResult<()> {
        let _ = index;
        Ok(())
    }

    /// Leaves the current element or entry.
    fn end_element(&mut self, index: usize) -> SyncResult<()> {
        let _ = index;
        Ok(())
    }

    /// Transports one null flag of a nullable list element.
    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        let _ = null;
        Ok(())
    }

    /// Opens a dictionary frame. Writers emit `*len`; readers overwrite it.
    fn begin_map(
        &mut self,
        len: &mut usize,
        key: WireCategory,
        value: WireCategory,
    ) -> SyncResult<()> {
        let _ = (len, key, value);
        Ok(())
    }

    /// Closes a dictionary frame.
    fn end_map(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Marks the next scalar as the key of the current dictionary entry.
    fn begin_key(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Ends the key position of the current dictionary entry.
    fn end_key(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Hands a detached node to the driver. Only the pool reclaimer does
    /// anything with it; every other driver drops it.
    fn reclaim(&mut self, node: Box<dyn Any>) {
        drop(node);
    }
}
