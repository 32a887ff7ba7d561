use std::any::TypeId;

use crate::binary::varint::{read_varint, unzigzag};
use crate::error::{MalformedKind, SyncError, SyncResult};
use crate::path::{FieldPath, PathSegment};
use crate::registry::{GlobalValue, SchemaRegistry};
use crate::sync::{PolySync, Syncable, Syncer};
use crate::wire::{END_KEY, WireCategory, split_dict_info, split_key, split_list_info};

/// Nesting bound for decode and structural skip.
const DEPTH_LIMIT: usize = 200;

// -----------------------------------------------------------------------------
// BinaryReader

/// The binary decoder.
///
/// Stateless apart from its registry; every `decode*` call runs an
/// independent cursor over the payload. Unknown field tags are skipped
/// structurally (the forward-compatibility path); everything else that
/// disagrees with the format is a fatal [`SyncError::Malformed`] carrying
/// the byte offset and field path of the failure.
pub struct BinaryReader<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> BinaryReader<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Decodes a plain top-level frame into a fresh default value.
    pub fn decode<T: Syncable + Default>(&self, data: &[u8]) -> SyncResult<T> {
        let mut value = T::default();
        self.decode_into(data, &mut value)?;
        Ok(value)
    }

    /// Decodes a plain top-level frame into an existing value. Fields absent
    /// from the payload keep whatever the destination already holds.
    pub fn decode_into<T: Syncable>(&self, data: &[u8], value: &mut T) -> SyncResult<()> {
        if T::CATEGORY != WireCategory::Child {
            return Err(SyncError::NotComposite {
                type_name: std::any::type_name::<T>(),
            });
        }
        let mut driver = BinDriver::new(self.registry, data);
        driver.expect_frame(WireCategory::Child)?;
        driver.begin_child()?;
        T::sync(&mut driver, value)?;
        driver.end_child()?;
        driver.expect_eof()
    }

    /// Decodes a global frame whose root `R` the caller knows at compile
    /// time, dispatching the payload's subtype tag through `R`'s table.
    pub fn decode_root<R: PolySync + ?Sized>(&self, data: &[u8]) -> SyncResult<Box<R>> {
        let root = TypeId::of::<R>();
        let mut driver = BinDriver::new(self.registry, data);
        let global_id = driver.expect_frame(WireCategory::ChildWithTag)?;
        match self.registry.global_root(global_id) {
            Some(bound) if bound == root => {}
            Some(_) => {
                return Err(SyncError::GlobalRootMismatch {
                    requested: self
                        .registry
                        .root_name(root)
                        .unwrap_or(std::any::type_name::<R>())
                        .into(),
                    global_id,
                });
            }
            None => return Err(SyncError::UnknownGlobalId { global_id }),
        }
        driver.begin_child()?;
        let mut tag = 0;
        driver.sync_subtype(root, &mut tag)?;
        let mut node = self.registry.instantiate_subtype::<R>(tag)?;
        node.poly_sync(&mut driver)?;
        driver.end_child()?;
        driver.expect_eof()?;
        Ok(node)
    }

    /// Decodes a global frame with no compile-time type knowledge: the
    /// payload's global ID picks the root from the registry.
    pub fn decode_global(&self, data: &[u8]) -> SyncResult<GlobalValue> {
        let mut driver = BinDriver::new(self.registry, data);
        let global_id = driver.expect_frame(WireCategory::ChildWithTag)?;
        let root = self
            .registry
            .global_root(global_id)
            .ok_or(SyncError::UnknownGlobalId { global_id })?;
        let value = driver.read_instance(global_id, root)?;
        driver.expect_eof()?;
        Ok(value)
    }

    pub(crate) fn driver<'a>(&self, data: &'a [u8]) -> BinDriver<'a, 'r> {
        BinDriver::new(self.registry, data)
    }
}

// -----------------------------------------------------------------------------
// BinDriver

struct ReadFrame {
    /// A field key read from the wire but not yet claimed by the delegate.
    pending: Option<(u64, WireCategory)>,
    /// Whether the end marker of this frame was consumed.
    done: bool,
}

/// One decoding pass: cursor, open frames and the error path.
pub(crate) struct BinDriver<'a, 'r> {
    registry: &'r SchemaRegistry,
    data: &'a [u8],
    pos: usize,
    frames: Vec<ReadFrame>,
    path: FieldPath,
    depth: usize,
}

impl<'a, 'r> BinDriver<'a, 'r> {
    pub(crate) fn new(registry: &'r SchemaRegistry, data: &'a [u8]) -> Self {
        Self {
            registry,
            data,
            pos: 0,
            frames: Vec::new(),
            path: FieldPath::new(),
            depth: 0,
        }
    }

    fn malformed(&self, kind: MalformedKind) -> SyncError {
        SyncError::Malformed {
            kind,
            offset: self.pos,
            path: self.path.render(),
        }
    }

    fn varint(&mut self) -> SyncResult<u64> {
        read_varint(self.data, &mut self.pos).map_err(|kind| self.malformed(kind))
    }

    fn take(&mut self, n: usize) -> SyncResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.malformed(MalformedKind::TruncatedPayload))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Consumes the top-level frame marker, returning the global ID for
    /// `ChildWithTag` frames and 0 for plain ones.
    pub(crate) fn expect_frame(&mut self, expected: WireCategory) -> SyncResult<u32> {
        let key = self.varint()?;
        let (tag, category) = split_key(key);
        if tag != 0 || category != expected {
            return Err(self.malformed(MalformedKind::CategoryMismatch {
                expected,
                found: category,
            }));
        }
        if expected == WireCategory::ChildWithTag {
            let global_id = self.varint()?;
            return u32::try_from(global_id)
                .map_err(|_| self.malformed(MalformedKind::ValueOutOfRange));
        }
        Ok(0)
    }

    pub(crate) fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    pub(crate) fn read_count(&mut self) -> SyncResult<usize> {
        let raw = self.varint()?;
        usize::try_from(raw).map_err(|_| self.malformed(MalformedKind::TruncatedPayload))
    }

    pub(crate) fn read_global_id(&mut self) -> SyncResult<u32> {
        let raw = self.varint()?;
        u32::try_from(raw).map_err(|_| self.malformed(MalformedKind::ValueOutOfRange))
    }

    pub(crate) fn expect_eof(&self) -> SyncResult<()> {
        if self.pos != self.data.len() {
            return Err(self.malformed(MalformedKind::TrailingBytes));
        }
        Ok(())
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Reads one global-frame instance body: subtype tag, fields, end
    /// marker. Shared by `decode_global` and the reference-pack decoder.
    pub(crate) fn read_instance(&mut self, global_id: u32, root: TypeId) -> SyncResult<GlobalValue> {
        let registry = self.registry;
        self.begin_child()?;
        let mut tag = 0;
        self.sync_subtype(root, &mut tag)?;
        let (mut node, name) = registry.instantiate_erased(root, tag)?;
        registry.sync_erased(root, &mut *node, self)?;
        self.end_child()?;
        Ok(GlobalValue::new(global_id, tag, root, name, node))
    }

    fn enter_frame(&mut self) -> SyncResult<()> {
        self.depth += 1;
        if self.depth > DEPTH_LIMIT {
            return Err(self.malformed(MalformedKind::DepthLimit));
        }
        self.frames.push(ReadFrame {
            pending: None,
            done: false,
        });
        Ok(())
    }

    /// Structurally consumes one value of the given category. This is the
    /// skip-unknown path: it needs no schema, only the framing.
    fn skip_value(&mut self, category: WireCategory) -> SyncResult<()> {
        self.depth += 1;
        if self.depth > DEPTH_LIMIT {
            self.depth -= 1;
            return Err(self.malformed(MalformedKind::DepthLimit));
        }
        let result = self.skip_value_inner(category);
        self.depth -= 1;
        result
    }

    fn skip_value_inner(&mut self, category: WireCategory) -> SyncResult<()> {
        match category {
            WireCategory::VarInt => {
                self.varint()?;
            }
            WireCategory::Fixed32 => {
                self.take(4)?;
            }
            WireCategory::Fixed64 => {
                self.take(8)?;
            }
            WireCategory::Length => {
                let len = self.varint()?;
                let len = usize::try_from(len)
                    .map_err(|_| self.malformed(MalformedKind::TruncatedPayload))?;
                self.take(len)?;
            }
            WireCategory::Child | WireCategory::ChildWithTag => {
                if category == WireCategory::ChildWithTag {
                    self.varint()?;
                }
                loop {
                    let key = self.varint()?;
                    if key == END_KEY {
                        break;
                    }
                    let (_, inner) = split_key(key);
                    self.skip_value(inner)?;
                }
            }
            WireCategory::List => {
                let info = self.take(1)?[0];
                let (element, nullable) =
                    split_list_info(info).map_err(|kind| self.malformed(kind))?;
                let count = self.varint()?;
                for _ in 0..count {
                    let null = if nullable {
                        let flag = self.take(1)?[0];
                        if flag > 1 {
                            return Err(self.malformed(MalformedKind::InvalidNullFlag));
                        }
                        flag == 1
                    } else {
                        false
                    };
                    if !null {
                        self.skip_value(element)?;
                    }
                }
            }
            WireCategory::Dict => {
                let info = self.take(1)?[0];
                let (key, value) = split_dict_info(info).map_err(|kind| self.malformed(kind))?;
                let count = self.varint()?;
                for _ in 0..count {
                    self.skip_value(key)?;
                    self.skip_value(value)?;
                }
            }
        }
        Ok(())
    }
}

impl Syncer for BinDriver<'_, '_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn reading(&self) -> bool {
        true
    }

    /// Scans forward through the current frame for the requested tag,
    /// structurally skipping unknown tags below it. Because delegates
    /// declare fields in ascending tag order, one pass suffices: a pending
    /// key above the requested tag simply means the field is absent.
    fn enter_field(
        &mut self,
        tag: u16,
        name: &'static str,
        category: WireCategory,
        _present: bool,
    ) -> SyncResult<bool> {
        loop {
            let (done, pending) = match self.frames.last() {
                Some(frame) => (frame.done, frame.pending),
                None => return Err(self.malformed(MalformedKind::UnexpectedEof)),
            };
            if done {
                return Ok(false);
            }
            let (wire_tag, wire_category) = match pending {
                Some(pending) => pending,
                None => {
                    let key = self.varint()?;
                    if key == END_KEY {
                        if let Some(frame) = self.frames.last_mut() {
                            frame.done = true;
                        }
                        return Ok(false);
                    }
                    let pending = split_key(key);
                    if let Some(frame) = self.frames.last_mut() {
                        frame.pending = Some(pending);
                    }
                    pending
                }
            };
            if wire_tag < u64::from(tag) {
                if let Some(frame) = self.frames.last_mut() {
                    frame.pending = None;
                }
                self.skip_value(wire_category)?;
                continue;
            }
            if wire_tag > u64::from(tag) {
                return Ok(false);
            }
            if wire_category != category {
                return Err(self.malformed(MalformedKind::CategoryMismatch {
                    expected: category,
                    found: wire_category,
                }));
            }
            if let Some(frame) = self.frames.last_mut() {
                frame.pending = None;
            }
            self.path.push(PathSegment::Field(name));
            return Ok(true);
        }
    }

    fn leave_field(&mut self) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        let raw = self.varint()?;
        if raw > 1 {
            return Err(self.malformed(MalformedKind::ValueOutOfRange));
        }
        *value = raw == 1;
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        let raw = unzigzag(self.varint()?);
        *value =
            i32::try_from(raw).map_err(|_| self.malformed(MalformedKind::ValueOutOfRange))?;
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        let raw = self.varint()?;
        *value =
            u32::try_from(raw).map_err(|_| self.malformed(MalformedKind::ValueOutOfRange))?;
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        *value = unzigzag(self.varint()?);
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        *value = self.varint()?;
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        let bytes = self.take(4)?;
        *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        let bytes = self.take(8)?;
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(bytes);
        *value = f64::from_le_bytes(raw);
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        let len = self.varint()?;
        let len =
            usize::try_from(len).map_err(|_| self.malformed(MalformedKind::TruncatedPayload))?;
        let bytes = self.take(len)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| self.malformed(MalformedKind::InvalidUtf8))?;
        value.clear();
        value.push_str(text);
        Ok(())
    }

    fn begin_child(&mut self) -> SyncResult<()> {
        self.enter_frame()
    }

    /// Drains every field the delegate did not claim, then consumes the end
    /// marker. Unknown trailing tags land here and are skipped.
    fn end_child(&mut self) -> SyncResult<()> {
        loop {
            let (done, pending) = match self.frames.last_mut() {
                Some(frame) => (frame.done, frame.pending.take()),
                None => return Err(self.malformed(MalformedKind::UnexpectedEof)),
            };
            if done {
                break;
            }
            if let Some((_, category)) = pending {
                self.skip_value(category)?;
                continue;
            }
            let key = self.varint()?;
            if key == END_KEY {
                break;
            }
            let (_, category) = split_key(key);
            self.skip_value(category)?;
        }
        self.frames.pop();
        self.depth -= 1;
        Ok(())
    }

    fn sync_subtype(&mut self, root: TypeId, tag: &mut u32) -> SyncResult<()> {
        let raw = self.varint()?;
        let wire_tag =
            u32::try_from(raw).map_err(|_| self.malformed(MalformedKind::ValueOutOfRange))?;
        if !self.registry.knows_subtype(root, wire_tag) {
            return Err(SyncError::UnknownSubtypeTag {
                root: self
                    .registry
                    .root_name(root)
                    .unwrap_or("unregistered root")
                    .into(),
                tag: wire_tag,
                path: self.path.render(),
            });
        }
        *tag = wire_tag;
        Ok(())
    }

    fn begin_list(
        &mut self,
        len: &mut usize,
        element: WireCategory,
        nullable: bool,
    ) -> SyncResult<()> {
        let info = self.take(1)?[0];
        let (wire_element, wire_nullable) =
            split_list_info(info).map_err(|kind| self.malformed(kind))?;
        if wire_element != element {
            return Err(self.malformed(MalformedKind::CategoryMismatch {
                expected: element,
                found: wire_element,
            }));
        }
        if wire_nullable != nullable {
            return Err(self.malformed(MalformedKind::InvalidInfoByte));
        }
        let count = self.varint()?;
        *len =
            usize::try_from(count).map_err(|_| self.malformed(MalformedKind::TruncatedPayload))?;
        Ok(())
    }

    fn begin_element(&mut self, index: usize) -> SyncResult<()> {
        self.path.push(PathSegment::Index(index));
        Ok(())
    }

    fn end_element(&mut self, _index: usize) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        let flag = self.take(1)?[0];
        if flag > 1 {
            return Err(self.malformed(MalformedKind::InvalidNullFlag));
        }
        *null = flag == 1;
        Ok(())
    }

    fn begin_map(
        &mut self,
        len: &mut usize,
        key: WireCategory,
        value: WireCategory,
    ) -> SyncResult<()> {
        let info = self.take(1)?[0];
        let (wire_key, wire_value) = split_dict_info(info).map_err(|kind| self.malformed(kind))?;
        if wire_key != key || wire_value != value {
            return Err(self.malformed(MalformedKind::CategoryMismatch {
                expected: value,
                found: wire_value,
            }));
        }
        let count = self.varint()?;
        *len =
            usize::try_from(count).map_err(|_| self.malformed(MalformedKind::TruncatedPayload))?;
        Ok(())
    }
}
