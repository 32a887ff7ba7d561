use std::any::TypeId;

use sk_utils::hash::HashMap;

use crate::error::{SyncError, SyncResult};
use crate::json::GLOBAL_TYPE_KEY;
use crate::refs::Ref;
use crate::sync::{PolySync, SyncEnum, SyncKey, Syncable, Syncer};
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// Glue helpers

/// Applies value framing and dispatches to the delegate.
///
/// Composites get a child frame here, which is the single place framing is
/// decided — the delegate itself lists fields only.
pub(crate) fn sync_value<T: Syncable>(
    s: &mut (dyn Syncer + '_),
    value: &mut T,
) -> SyncResult<()> {
    if let WireCategory::Child = T::CATEGORY {
        s.begin_child()?;
        T::sync(s, value)?;
        s.end_child()
    } else {
        T::sync(s, value)
    }
}

fn check_field_key(tag: u16, name: &'static str) -> SyncResult<()> {
    if tag == 0 {
        return Err(SyncError::ReservedFieldTag { name });
    }
    if name == GLOBAL_TYPE_KEY {
        return Err(SyncError::ReservedFieldName {
            name: GLOBAL_TYPE_KEY,
        });
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// SyncOps

/// The typed operations delegates are written against.
///
/// Blanket-implemented for every [`Syncer`], including the trait object the
/// delegate receives. All operations share the same presence contract:
///
/// - writing elides a field whose value equals its declared default
///   (zero bytes on the binary wire, no member in JSON, nothing folded into
///   the structural hash);
/// - reading leaves the destination untouched when the field is absent;
/// - reading instantiates a destination before filling it when none exists,
///   so caller-supplied instances are reused in place.
pub trait SyncOps: Syncer {
    /// Syncs one keyed field, eliding it when `*value == default`.
    fn field<T: Syncable + PartialEq>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut T,
        default: T,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let present = *value != default;
        if self.enter_field(tag, name, T::CATEGORY, present)? {
            sync_value(self.as_dyn(), value)?;
            self.leave_field()?;
        }
        Ok(())
    }

    /// Nullable variant of [`field`](Self::field): `None` is the default and
    /// elides; a present field materializes `Some` before filling it.
    fn field_opt<T: Syncable + Default>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut Option<T>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let present = value.is_some();
        if self.enter_field(tag, name, T::CATEGORY, present)? {
            if self.reading() && value.is_none() {
                *value = Some(T::default());
            }
            if let Some(inner) = value {
                sync_value(self.as_dyn(), inner)?;
            }
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs an int-backed enum field by its wire index.
    fn enum_field<E: SyncEnum>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut E,
        default: E,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let mut index = value.to_index();
        let present = *value != default;
        if self.enter_field(tag, name, WireCategory::VarInt, present)? {
            self.sync_i32(&mut index)?;
            if self.reading() {
                *value = E::from_index(index).ok_or_else(|| SyncError::UnknownEnumValue {
                    enum_name: E::NAME,
                    value: index,
                    path: String::from(name),
                })?;
            }
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs a list field. An empty list is the default and elides; reading
    /// reuses existing elements in place and tops up with `T::default()`.
    fn list<T: Syncable + Default>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut Vec<T>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let mut len = value.len();
        if self.enter_field(tag, name, WireCategory::List, len != 0)? {
            self.begin_list(&mut len, T::CATEGORY, false)?;
            if self.reading() {
                value.truncate(len);
                while value.len() < len {
                    value.push(T::default());
                }
            }
            for (index, element) in value.iter_mut().enumerate().take(len) {
                self.begin_element(index)?;
                sync_value(self.as_dyn(), element)?;
                self.end_element(index)?;
            }
            self.end_list()?;
            if self.detaching() {
                value.clear();
            }
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs a list whose elements may be null. Position and null-ness are
    /// preserved exactly; each element carries a null flag on the wire.
    fn list_opt<T: Syncable + Default>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut Vec<Option<T>>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let mut len = value.len();
        if self.enter_field(tag, name, WireCategory::List, len != 0)? {
            self.begin_list(&mut len, T::CATEGORY, true)?;
            if self.reading() {
                value.truncate(len);
                while value.len() < len {
                    value.push(None);
                }
            }
            for index in 0..len {
                self.begin_element(index)?;
                let slot = &mut value[index];
                let mut null = slot.is_none();
                self.sync_null(&mut null)?;
                if null {
                    if self.reading() {
                        *slot = None;
                    }
                } else {
                    if self.reading() && slot.is_none() {
                        *slot = Some(T::default());
                    }
                    if let Some(inner) = slot {
                        sync_value(self.as_dyn(), inner)?;
                    }
                }
                self.end_element(index)?;
            }
            self.end_list()?;
            if self.detaching() {
                value.clear();
            }
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs a dictionary field. Entries travel sorted by key; an empty
    /// dictionary is the default and elides. Reading replaces the contents.
    fn map<K: SyncKey, V: Syncable + Default>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut HashMap<K, V>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let mut len = value.len();
        if self.enter_field(tag, name, WireCategory::Dict, len != 0)? {
            self.begin_map(&mut len, K::CATEGORY, V::CATEGORY)?;
            if self.reading() {
                value.clear();
                for index in 0..len {
                    self.begin_element(index)?;
                    self.begin_key()?;
                    let mut key = K::default();
                    K::sync_key(self.as_dyn(), &mut key)?;
                    self.end_key()?;
                    let mut entry = V::default();
                    sync_value(self.as_dyn(), &mut entry)?;
                    self.end_element(index)?;
                    value.insert(key, entry);
                }
            } else {
                let mut keys: Vec<K> = value.keys().cloned().collect();
                keys.sort();
                for (index, key) in keys.into_iter().enumerate() {
                    self.begin_element(index)?;
                    self.begin_key()?;
                    let mut wire_key = key.clone();
                    K::sync_key(self.as_dyn(), &mut wire_key)?;
                    self.end_key()?;
                    if let Some(entry) = value.get_mut(&key) {
                        sync_value(self.as_dyn(), entry)?;
                    }
                    self.end_element(index)?;
                }
                if self.detaching() {
                    value.clear();
                }
            }
            self.end_map()?;
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs a reference handle by its numeric ID. ID 0 ("no reference") is
    /// the default and elides.
    fn reference<T: ?Sized + 'static>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut Ref<T>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        let mut id = value.id();
        if self.enter_field(tag, name, WireCategory::VarInt, id != 0)? {
            self.sync_u64(&mut id)?;
            if self.reading() {
                *value = Ref::from_id(id);
            }
            self.leave_field()?;
        }
        Ok(())
    }

    /// Syncs a polymorphic child field through the subtype table of root
    /// `R`. `None` is the default and elides. Reading replaces the existing
    /// instance whenever the wire subtype differs — decode never merges
    /// across subtypes.
    fn poly<R: PolySync + ?Sized + 'static>(
        &mut self,
        tag: u16,
        name: &'static str,
        value: &mut Option<Box<R>>,
    ) -> SyncResult<()> {
        check_field_key(tag, name)?;
        if self.detaching() {
            if let Some(mut node) = value.take() {
                let s = self.as_dyn();
                s.begin_child()?;
                node.poly_sync(s)?;
                s.end_child()?;
                self.reclaim(node.into_any());
            }
            return Ok(());
        }
        let root = TypeId::of::<R>();
        let present = value.is_some();
        if !self.enter_field(tag, name, WireCategory::ChildWithTag, present)? {
            return Ok(());
        }
        let mut wire_tag = match value {
            Some(node) => self
                .registry()
                .subtype_tag(root, node.poly_type_id())
                .ok_or_else(|| SyncError::UnregisteredType {
                    type_name: node.poly_type_name().into(),
                })?,
            None => 0,
        };
        self.begin_child()?;
        self.sync_subtype(root, &mut wire_tag)?;
        if self.reading() {
            let keep = match value {
                Some(node) => {
                    self.registry().subtype_tag(root, node.poly_type_id()) == Some(wire_tag)
                }
                None => false,
            };
            if !keep {
                let node = self.registry().instantiate_subtype::<R>(wire_tag)?;
                *value = Some(node);
            }
        }
        if let Some(node) = value {
            node.poly_sync(self.as_dyn())?;
        }
        self.end_child()?;
        self.leave_field()
    }

    /// Syncs an embedded base-class slice: the base's fields flow into the
    /// current frame, sharing its tag space. No framing is added.
    fn base<B: Syncable>(&mut self, value: &mut B) -> SyncResult<()> {
        B::sync(self.as_dyn(), value)
    }
}

impl<S: Syncer + ?Sized> SyncOps for S {}
