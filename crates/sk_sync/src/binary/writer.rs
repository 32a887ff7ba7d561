use std::any::TypeId;

use crate::binary::varint::{push_varint, zigzag};
use crate::error::{SyncError, SyncResult};
use crate::registry::SchemaRegistry;
use crate::sync::{PolySync, Syncable, Syncer};
use crate::wire::{WireCategory, dict_info, field_key, list_info};

// -----------------------------------------------------------------------------
// BinaryWriter

/// The binary encoder.
///
/// A reusable output buffer over a registry: each `encode*` call clears and
/// refills the buffer, and the returned slice stays valid until the next
/// call. Fields equal to their declared default emit zero bytes, which is
/// why an all-default composite encodes to exactly two bytes (frame marker
/// plus end marker).
///
/// # Examples
///
/// ```
/// use sk_sync::binary::BinaryWriter;
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
/// let registry = SchemaRegistry::new();
/// let mut writer = BinaryWriter::new(&registry);
/// let bytes = writer.encode(&mut Item::default()).unwrap();
/// assert_eq!(bytes, [0x04, 0x00]);
/// ```
pub struct BinaryWriter<'r> {
    registry: &'r SchemaRegistry,
    pub(crate) buf: Vec<u8>,
    frames: Vec<u16>,
}

impl<'r> BinaryWriter<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            buf: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Encodes a composite value as a plain top-level frame.
    pub fn encode<T: Syncable>(&mut self, value: &mut T) -> SyncResult<&[u8]> {
        if T::CATEGORY != WireCategory::Child {
            return Err(SyncError::NotComposite {
                type_name: std::any::type_name::<T>(),
            });
        }
        self.reset();
        push_varint(&mut self.buf, field_key(0, WireCategory::Child));
        self.begin_child()?;
        T::sync(self, value)?;
        self.end_child()?;
        Ok(&self.buf)
    }

    /// Encodes a value of registered root `R` as a global frame carrying
    /// its global ID and subtype tag, decodable without compile-time type
    /// knowledge.
    pub fn encode_global<R: PolySync + ?Sized>(&mut self, value: &mut R) -> SyncResult<&[u8]> {
        let root = TypeId::of::<R>();
        let global_id =
            self.registry
                .global_of(root)
                .ok_or_else(|| SyncError::UnregisteredType {
                    type_name: std::any::type_name::<R>().into(),
                })?;
        let mut tag = self
            .registry
            .subtype_tag(root, value.poly_type_id())
            .ok_or_else(|| SyncError::UnregisteredType {
                type_name: value.poly_type_name().into(),
            })?;
        self.reset();
        push_varint(&mut self.buf, field_key(0, WireCategory::ChildWithTag));
        push_varint(&mut self.buf, u64::from(global_id));
        self.begin_child()?;
        self.sync_subtype(root, &mut tag)?;
        value.poly_sync(self)?;
        self.end_child()?;
        Ok(&self.buf)
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.frames.clear();
    }

    /// Writes one global-frame instance body (subtype tag + fields + end
    /// marker) into the current buffer. Used by the reference-pack format.
    pub(crate) fn write_instance(
        &mut self,
        root: TypeId,
        node: &mut dyn std::any::Any,
        mut tag: u32,
    ) -> SyncResult<()> {
        let registry = self.registry;
        self.begin_child()?;
        self.sync_subtype(root, &mut tag)?;
        registry.sync_erased(root, node, self.as_dyn())?;
        self.end_child()
    }
}

impl Syncer for BinaryWriter<'_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn enter_field(
        &mut self,
        tag: u16,
        name: &'static str,
        category: WireCategory,
        present: bool,
    ) -> SyncResult<bool> {
        // Ascending order is checked even for elided fields so a bad
        // delegate fails on every value, not just non-default ones.
        if let Some(last) = self.frames.last_mut() {
            if tag <= *last {
                return Err(SyncError::NonAscendingTag { name, tag });
            }
            *last = tag;
        }
        if !present {
            return Ok(false);
        }
        push_varint(&mut self.buf, field_key(tag, category));
        Ok(true)
    }

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        push_varint(&mut self.buf, u64::from(*value));
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        push_varint(&mut self.buf, zigzag(i64::from(*value)));
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        push_varint(&mut self.buf, u64::from(*value));
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        push_varint(&mut self.buf, zigzag(*value));
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        push_varint(&mut self.buf, *value);
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        push_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn begin_child(&mut self) -> SyncResult<()> {
        self.frames.push(0);
        Ok(())
    }

    fn end_child(&mut self) -> SyncResult<()> {
        self.buf.push(0x00);
        self.frames.pop();
        Ok(())
    }

    fn sync_subtype(&mut self, _root: TypeId, tag: &mut u32) -> SyncResult<()> {
        push_varint(&mut self.buf, u64::from(*tag));
        Ok(())
    }

    fn begin_list(
        &mut self,
        len: &mut usize,
        element: WireCategory,
        nullable: bool,
    ) -> SyncResult<()> {
        self.buf.push(list_info(element, nullable));
        push_varint(&mut self.buf, *len as u64);
        Ok(())
    }

    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        self.buf.push(u8::from(*null));
        Ok(())
    }

    fn begin_map(
        &mut self,
        len: &mut usize,
        key: WireCategory,
        value: WireCategory,
    ) -> SyncResult<()> {
        self.buf.push(dict_info(key, value));
        push_varint(&mut self.buf, *len as u64);
        Ok(())
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncOps;

    #[derive(Default, PartialEq, Debug)]
    struct Item {
        name: String,
    }

    impl Syncable for Item {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(1, "name", &mut value.name, String::new())
        }
    }

    struct Backwards {
        a: i32,
        b: i32,
    }

    impl Syncable for Backwards {
        const CATEGORY: WireCategory = WireCategory::Child;

        fn sync(s: &mut (dyn Syncer + '_), value: &mut Self) -> SyncResult<()> {
            s.field(2, "a", &mut value.a, 0)?;
            s.field(1, "b", &mut value.b, 0)
        }
    }

    #[test]
    fn all_default_composite_is_two_bytes() {
        let registry = SchemaRegistry::new();
        let mut writer = BinaryWriter::new(&registry);
        assert_eq!(writer.encode(&mut Item::default()).unwrap(), [0x04, 0x00]);
    }

    #[test]
    fn item_frame_layout() {
        let registry = SchemaRegistry::new();
        let mut writer = BinaryWriter::new(&registry);
        let mut item = Item {
            name: String::from("Sword"),
        };
        let bytes = writer.encode(&mut item).unwrap();
        // frame, key (tag 1, Length), length, payload, end marker
        assert_eq!(bytes[0], 0x04);
        assert_eq!(bytes[1], (1 << 3) | 3);
        assert_eq!(bytes[2], 5);
        assert_eq!(&bytes[3..8], b"Sword");
        assert_eq!(bytes[8], 0x00);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn descending_tags_are_rejected() {
        let registry = SchemaRegistry::new();
        let mut writer = BinaryWriter::new(&registry);
        let mut bad = Backwards { a: 1, b: 2 };
        assert!(matches!(
            writer.encode(&mut bad),
            Err(SyncError::NonAscendingTag { tag: 1, .. })
        ));
    }
}
