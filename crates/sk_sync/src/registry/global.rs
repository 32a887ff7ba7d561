use std::any::{Any, TypeId};
use std::fmt;

/// A decoded global-frame value whose concrete root was chosen at runtime.
///
/// [`decode_global`](crate::binary::BinaryReader::decode_global) returns one
/// of these when the caller does not know the root type at compile time: the
/// payload's global ID picked the root from the registry, and the value is
/// carried type-erased. [`take_root`](Self::take_root) recovers the typed
/// handle once the caller has matched on [`global_id`](Self::global_id) or
/// [`is`](Self::is).
pub struct GlobalValue {
    global_id: u32,
    tag: u32,
    root: TypeId,
    type_name: &'static str,
    node: Box<dyn Any>,
}

impl GlobalValue {
    pub(crate) fn new(
        global_id: u32,
        tag: u32,
        root: TypeId,
        type_name: &'static str,
        node: Box<dyn Any>,
    ) -> Self {
        Self {
            global_id,
            tag,
            root,
            type_name,
            node,
        }
    }

    /// The global ID carried by the payload.
    #[inline]
    pub fn global_id(&self) -> u32 {
        self.global_id
    }

    /// The subtype tag carried by the payload (0 = the root's base type).
    #[inline]
    pub fn subtype_tag(&self) -> u32 {
        self.tag
    }

    /// The registered display name of the decoded concrete type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The `TypeId` of the root the value was decoded under.
    #[inline]
    pub fn root_type_id(&self) -> TypeId {
        self.root
    }

    /// Whether the value was decoded under root `R`.
    #[inline]
    pub fn is<R: ?Sized + 'static>(&self) -> bool {
        self.root == TypeId::of::<R>()
    }

    /// Borrows the value as root `R`, if that is what it is.
    pub fn root_ref<R: ?Sized + 'static>(&self) -> Option<&R> {
        self.node.downcast_ref::<Box<R>>().map(|node| &**node)
    }

    /// Consumes the erased value, recovering the typed handle. Returns
    /// `None` (and drops the value) when `R` is not the decoded root.
    pub fn take_root<R: ?Sized + 'static>(self) -> Option<Box<R>> {
        self.node.downcast::<Box<R>>().ok().map(|node| *node)
    }

    pub(crate) fn node_mut(&mut self) -> &mut dyn Any {
        &mut *self.node
    }
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalValue")
            .field("global_id", &self.global_id)
            .field("subtype_tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
