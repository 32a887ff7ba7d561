use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use sk_utils::TypeIdMap;

use crate::refs::ReferenceTable;

// -----------------------------------------------------------------------------
// Policy

/// Where [`Ref::resolve_ambient`](crate::refs::Ref::resolve_ambient) looks
/// for its table. Explicit tables are the primary resolution path; the
/// ambient store is opt-in sugar for hosts that want one process-wide (or
/// per-thread) table set, so the default is `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbientRefPolicy {
    /// No ambient store; `resolve_ambient` always misses.
    #[default]
    Disabled,
    /// One table set per thread.
    ThreadLocal,
    /// One mutex-guarded table set for the whole process.
    Global,
}

static POLICY: AtomicU8 = AtomicU8::new(0);

/// Selects the ambient store. Hosts call this once during startup; switching
/// policies does not migrate tables between stores.
pub fn set_ambient_policy(policy: AmbientRefPolicy) {
    POLICY.store(policy as u8, Ordering::Release);
}

/// The currently selected ambient policy.
pub fn ambient_policy() -> AmbientRefPolicy {
    match POLICY.load(Ordering::Acquire) {
        1 => AmbientRefPolicy::ThreadLocal,
        2 => AmbientRefPolicy::Global,
        _ => AmbientRefPolicy::Disabled,
    }
}

// -----------------------------------------------------------------------------
// Stores

type ErasedTables = TypeIdMap<Box<dyn Any + Send>>;

static GLOBAL_TABLES: OnceLock<Mutex<ErasedTables>> = OnceLock::new();

thread_local! {
    static LOCAL_TABLES: RefCell<ErasedTables> = RefCell::new(TypeIdMap::new());
}

/// Runs `f` against the ambient [`ReferenceTable`] for target type `T`,
/// creating the table on first use. Returns `None` under
/// [`AmbientRefPolicy::Disabled`].
pub fn with_ambient_table<T, F, R>(f: F) -> Option<R>
where
    T: ?Sized + Send + Sync + 'static,
    F: FnOnce(&mut ReferenceTable<T>) -> R,
{
    match ambient_policy() {
        AmbientRefPolicy::Disabled => None,
        AmbientRefPolicy::ThreadLocal => LOCAL_TABLES.with(|tables| {
            let mut tables = tables.borrow_mut();
            Some(f(table_of::<T>(&mut tables)))
        }),
        AmbientRefPolicy::Global => {
            let tables = GLOBAL_TABLES.get_or_init(|| Mutex::new(TypeIdMap::new()));
            let mut tables = tables.lock().unwrap_or_else(PoisonError::into_inner);
            Some(f(table_of::<T>(&mut tables)))
        }
    }
}

fn table_of<T: ?Sized + Send + Sync + 'static>(
    tables: &mut ErasedTables,
) -> &mut ReferenceTable<T> {
    let slot = tables.get_or_insert_with(TypeId::of::<ReferenceTable<T>>(), || {
        Box::new(ReferenceTable::<T>::new())
    });
    // the slot was created for exactly this type above
    slot.downcast_mut::<ReferenceTable<T>>()
        .unwrap_or_else(|| unreachable!())
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::refs::Ref;

    // one test so the process-wide policy is not raced by parallel tests
    #[test]
    fn policy_gates_the_ambient_store() {
        assert_eq!(ambient_policy(), AmbientRefPolicy::Disabled);
        assert!(Ref::<String>::from_id(1).resolve_ambient().is_none());

        set_ambient_policy(AmbientRefPolicy::ThreadLocal);
        with_ambient_table::<String, _, _>(|table| {
            table
                .try_insert(8, "Banner", Arc::new(String::from("banner")))
                .unwrap();
        })
        .unwrap();
        let hit = Ref::<String>::from_id(8).resolve_ambient();
        assert_eq!(hit.as_deref().map(String::as_str), Some("banner"));

        set_ambient_policy(AmbientRefPolicy::Disabled);
        assert!(Ref::<String>::from_id(8).resolve_ambient().is_none());
    }
}
