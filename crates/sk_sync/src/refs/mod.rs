//! ID-based reference handles, reference tables with deferred loaders, and
//! the heterogeneous reference-pack wire format.

mod ambient;
mod pack;

pub use ambient::{AmbientRefPolicy, ambient_policy, set_ambient_policy, with_ambient_table};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use sk_utils::hash::HashMap;

use crate::error::{SyncError, SyncResult};

// -----------------------------------------------------------------------------
// Ref

/// A reference to another value by numeric ID. ID 0 means "no reference".
///
/// The handle never owns or keeps its target alive — it is only an ID plus
/// a phantom target type, so it stays `Copy`, survives serialization
/// unchanged (varint on the binary wire, elided at 0) and compares, hashes
/// and orders by ID alone. Resolution goes through a [`ReferenceTable`]
/// supplied by the caller, or through the process-wide ambient store when
/// the host opted into one.
pub struct Ref<T: ?Sized> {
    id: u64,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Ref<T> {
    /// The null reference.
    pub const fn none() -> Self {
        Self::from_id(0)
    }

    /// Wraps a raw ID.
    pub const fn from_id(id: u64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The raw ID.
    #[inline]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Whether this is the null reference.
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.id == 0
    }

    /// Resolves against an explicit table. A miss is `None`, never an
    /// error.
    pub fn resolve(&self, table: &mut ReferenceTable<T>) -> Option<Arc<T>> {
        table.get(self.id)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Ref<T> {
    /// Resolves against the ambient table selected by
    /// [`AmbientRefPolicy`]. `None` when the policy is `Disabled`, the
    /// ambient table has no entry, or the reference is null.
    pub fn resolve_ambient(&self) -> Option<Arc<T>> {
        let id = self.id;
        with_ambient_table::<T, _, _>(|table| table.get(id)).flatten()
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Ref<T> {}

impl<T: ?Sized> Default for Ref<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: ?Sized> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for Ref<T> {}

impl<T: ?Sized> PartialOrd for Ref<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Ref<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T: ?Sized> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.id)
    }
}

// -----------------------------------------------------------------------------
// ReferenceTable

type Loader<T> = Box<dyn FnOnce() -> (Arc<T>, String) + Send>;

/// An ID-keyed store of shared instances with optional deferred loaders.
///
/// A loader registered for an ID is invoked at most once, on the first
/// [`get`](Self::get) for that ID; the produced instance and display name
/// are cached and the loader is dropped. The table is unsynchronized —
/// callers that mutate it concurrently wrap it in their own lock.
pub struct ReferenceTable<T: ?Sized> {
    entries: HashMap<u64, Arc<T>>,
    loaders: HashMap<u64, Loader<T>>,
    names: HashMap<u64, String>,
}

impl<T: ?Sized> Default for ReferenceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ReferenceTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::default(),
            loaders: HashMap::default(),
            names: HashMap::default(),
        }
    }

    /// Inserts a materialized instance. IDs are unique per table and 0 is
    /// reserved for the null reference.
    pub fn try_insert(
        &mut self,
        id: u64,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> SyncResult<()> {
        self.claim_id(id)?;
        self.entries.insert(id, value);
        self.names.insert(id, name.into());
        Ok(())
    }

    /// Registers a deferred loader producing the instance and its display
    /// name on first resolution.
    pub fn try_insert_loader(
        &mut self,
        id: u64,
        loader: impl FnOnce() -> (Arc<T>, String) + Send + 'static,
    ) -> SyncResult<()> {
        self.claim_id(id)?;
        self.loaders.insert(id, Box::new(loader));
        Ok(())
    }

    fn claim_id(&self, id: u64) -> SyncResult<()> {
        if id == 0 {
            return Err(SyncError::RegistrationConflict {
                detail: String::from("reference id 0 is reserved for the null reference"),
            });
        }
        if self.entries.contains_key(&id) || self.loaders.contains_key(&id) {
            return Err(SyncError::RegistrationConflict {
                detail: format!("reference id {id} is already present in this table"),
            });
        }
        Ok(())
    }

    /// Resolves an ID. Materializes through the deferred loader when one is
    /// registered; a miss (including id 0) is `None`, never an error.
    pub fn get(&mut self, id: u64) -> Option<Arc<T>> {
        if id == 0 {
            return None;
        }
        if let Some(value) = self.entries.get(&id) {
            return Some(Arc::clone(value));
        }
        let loader = self.loaders.remove(&id)?;
        let (value, name) = loader();
        self.entries.insert(id, Arc::clone(&value));
        self.names.insert(id, name);
        Some(value)
    }

    /// The display name of a materialized entry.
    pub fn name(&self, id: u64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn null_and_missing_ids_are_soft_misses() {
        let mut table = ReferenceTable::<str>::new();
        assert!(table.get(0).is_none());
        assert!(table.get(17).is_none());
        assert_eq!(Ref::<str>::none().id(), 0);
        assert!(Ref::<str>::none().is_none());
    }

    #[test]
    fn loaders_run_exactly_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut table = ReferenceTable::<String>::new();
        table
            .try_insert_loader(5, || {
                CALLS.fetch_add(1, Ordering::SeqCst);
                (Arc::new(String::from("late")), String::from("Late"))
            })
            .unwrap();
        assert_eq!(table.get(5).as_deref().map(String::as_str), Some("late"));
        assert_eq!(table.get(5).as_deref().map(String::as_str), Some("late"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(table.name(5), Some("Late"));
    }

    #[test]
    fn ids_are_unique_per_table() {
        let mut table = ReferenceTable::<String>::new();
        table
            .try_insert(3, "A", Arc::new(String::from("a")))
            .unwrap();
        assert!(table.try_insert(3, "B", Arc::new(String::from("b"))).is_err());
        assert!(table.try_insert(0, "Z", Arc::new(String::from("z"))).is_err());
        let resolved = Ref::<String>::from_id(3).resolve(&mut table).unwrap();
        assert_eq!(*resolved, "a");
    }
}
