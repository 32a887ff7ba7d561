use std::any::TypeId;
use std::borrow::Cow;

use crate::error::{SyncError, SyncResult};
use crate::json::GLOBAL_TYPE_KEY;
use crate::json::tokenizer::{Node, NodeKind, tokenize, unescape};
use crate::path::{FieldPath, PathSegment};
use crate::registry::{GlobalValue, SchemaRegistry};
use crate::sync::{PolySync, Syncable, Syncer};
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// JsonReader

/// The JSON decoder.
///
/// Reuses one flat node buffer across `decode*` calls. Field resolution is
/// by member name, so member order in the document does not matter and
/// unknown members are ignored — the JSON counterpart of binary
/// skip-unknown.
pub struct JsonReader<'r> {
    registry: &'r SchemaRegistry,
    nodes: Vec<Node>,
}

impl<'r> JsonReader<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
        }
    }

    /// Decodes a JSON object into a fresh default value.
    pub fn decode<T: Syncable + Default>(&mut self, text: &str) -> SyncResult<T> {
        let mut value = T::default();
        self.decode_into(text, &mut value)?;
        Ok(value)
    }

    /// Decodes a JSON object into an existing value; absent members leave
    /// the destination untouched.
    pub fn decode_into<T: Syncable>(&mut self, text: &str, value: &mut T) -> SyncResult<()> {
        if T::CATEGORY != WireCategory::Child {
            return Err(SyncError::NotComposite {
                type_name: std::any::type_name::<T>(),
            });
        }
        tokenize(text, &mut self.nodes)?;
        let mut driver = JsonDriver::new(self.registry, text, &self.nodes);
        driver.begin_child()?;
        T::sync(&mut driver, value)?;
        driver.end_child()
    }

    /// Decodes a document under a root known at compile time. The
    /// `-globalType` wrapper picks the subtype; without a wrapper the root's
    /// own base type is instantiated, which is an ambiguous-root error for
    /// non-concrete roots.
    pub fn decode_root<R: PolySync + ?Sized>(&mut self, text: &str) -> SyncResult<Box<R>> {
        tokenize(text, &mut self.nodes)?;
        let root = TypeId::of::<R>();
        let mut driver = JsonDriver::new(self.registry, text, &self.nodes);
        driver.begin_child()?;
        let mut tag = 0;
        driver.sync_subtype(root, &mut tag)?;
        let mut node = self.registry.instantiate_subtype::<R>(tag)?;
        node.poly_sync(&mut driver)?;
        driver.end_child()?;
        Ok(node)
    }

    /// Decodes a document with no compile-time type knowledge; requires the
    /// `-globalType` wrapper.
    pub fn decode_global(&mut self, text: &str) -> SyncResult<GlobalValue> {
        tokenize(text, &mut self.nodes)?;
        let mut driver = JsonDriver::new(self.registry, text, &self.nodes);
        driver.begin_child()?;
        let Some((global_id, name)) = driver.read_wrapper()? else {
            return Err(SyncError::AmbiguousRoot {
                root: Cow::Borrowed("(unknown)"),
            });
        };
        let root = self
            .registry
            .global_root(global_id)
            .ok_or(SyncError::UnknownGlobalId { global_id })?;
        let tag = self
            .registry
            .subtype_tag_by_name(root, &name)
            .ok_or_else(|| SyncError::UnknownSubtypeName {
                root: self.registry.root_name(root).unwrap_or("?").into(),
                name: name.clone(),
                path: String::from("(root)"),
            })?;
        let (mut node, type_name) = self.registry.instantiate_erased(root, tag)?;
        self.registry.sync_erased(root, &mut *node, &mut driver)?;
        driver.end_child()?;
        Ok(GlobalValue::new(global_id, tag, root, type_name, node))
    }
}

// -----------------------------------------------------------------------------
// JsonDriver

struct JsonFrame {
    container: usize,
    /// Next unvisited element (arrays) or member key (dictionary objects).
    next: usize,
    /// Key node of the dictionary entry currently open.
    pending_key: usize,
}

struct JsonDriver<'a, 'r> {
    registry: &'r SchemaRegistry,
    text: &'a str,
    nodes: &'a [Node],
    /// Node index of the value about to be consumed.
    cur: usize,
    frames: Vec<JsonFrame>,
    key_mode: bool,
    path: FieldPath,
}

impl<'a, 'r> JsonDriver<'a, 'r> {
    fn new(registry: &'r SchemaRegistry, text: &'a str, nodes: &'a [Node]) -> Self {
        Self {
            registry,
            text,
            nodes,
            cur: 0,
            frames: Vec::new(),
            key_mode: false,
            path: FieldPath::new(),
        }
    }

    fn fail(&self, detail: impl Into<Cow<'static, str>>, offset: usize) -> SyncError {
        SyncError::MalformedJson {
            detail: detail.into(),
            offset,
            path: self.path.render(),
        }
    }

    fn node(&self, index: usize) -> SyncResult<Node> {
        self.nodes
            .get(index)
            .copied()
            .ok_or_else(|| self.fail("value ended unexpectedly", self.text.len()))
    }

    fn current(&self) -> SyncResult<Node> {
        self.node(self.cur)
    }

    fn key_equals(&self, key: Node, name: &str) -> SyncResult<bool> {
        let raw = &self.text[key.start + 1..key.end - 1];
        if !raw.contains('\\') {
            return Ok(raw == name);
        }
        Ok(unescape(self.text, key.start, key.end)? == name)
    }

    /// Finds a member's value node by key name, scanning the whole object
    /// so member order never matters.
    fn find_member(&self, container: usize, name: &str) -> SyncResult<Option<usize>> {
        let object = self.node(container)?;
        let mut index = container + 1;
        for _ in 0..object.count {
            let key = self.node(index)?;
            let value = index + 1;
            if self.key_equals(key, name)? {
                return Ok(Some(value));
            }
            index = value + self.node(value)?.span;
        }
        Ok(None)
    }

    /// The top-level `-globalType` wrapper, if present.
    fn read_wrapper(&self) -> SyncResult<Option<(u32, String)>> {
        let container = match self.frames.last() {
            Some(frame) => frame.container,
            None => return Ok(None),
        };
        let Some(value) = self.find_member(container, GLOBAL_TYPE_KEY)? else {
            return Ok(None);
        };
        let node = self.node(value)?;
        if node.kind != NodeKind::String {
            return Err(self.fail("wrapper value must be a string", node.start));
        }
        let content = unescape(self.text, node.start, node.end)?;
        let Some((id_text, name)) = content.split_once(':') else {
            return Err(self.fail("wrapper must be `<id>:<typeName>`", node.start));
        };
        let global_id = id_text
            .parse::<u32>()
            .map_err(|_| self.fail("wrapper carries a malformed global id", node.start))?;
        Ok(Some((global_id, name.to_owned())))
    }

    fn scalar_text(&self, expected: NodeKind) -> SyncResult<(Node, &'a str)> {
        let node = self.current()?;
        let wanted = if self.key_mode { NodeKind::Key } else { expected };
        if node.kind != wanted {
            return Err(self.fail(
                match expected {
                    NodeKind::Number => "expected a number",
                    NodeKind::String => "expected a string",
                    NodeKind::Bool => "expected a boolean",
                    _ => "unexpected value",
                },
                node.start,
            ));
        }
        let text = if node.kind == NodeKind::Key || node.kind == NodeKind::String {
            // quoted token; integer keys still carry quotes
            &self.text[node.start + 1..node.end - 1]
        } else {
            &self.text[node.start..node.end]
        };
        Ok((node, text))
    }

    fn parse_int<T: std::str::FromStr>(&self) -> SyncResult<T> {
        let (node, text) = self.scalar_text(NodeKind::Number)?;
        text.parse::<T>()
            .map_err(|_| self.fail("expected an integer in range", node.start))
    }
}

impl Syncer for JsonDriver<'_, '_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn reading(&self) -> bool {
        true
    }

    fn enter_field(
        &mut self,
        _tag: u16,
        name: &'static str,
        _category: WireCategory,
        _present: bool,
    ) -> SyncResult<bool> {
        let container = match self.frames.last() {
            Some(frame) => frame.container,
            None => return Err(self.fail("no open object", 0)),
        };
        match self.find_member(container, name)? {
            Some(value) => {
                self.cur = value;
                self.path.push(PathSegment::Field(name));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn leave_field(&mut self) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        let (_, text) = self.scalar_text(NodeKind::Bool)?;
        *value = text == "true";
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        *value = self.parse_int()?;
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        *value = self.parse_int()?;
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        *value = self.parse_int()?;
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        *value = self.parse_int()?;
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        let (node, text) = self.scalar_text(NodeKind::Number)?;
        *value = text
            .parse::<f32>()
            .map_err(|_| self.fail("expected a number", node.start))?;
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        let (node, text) = self.scalar_text(NodeKind::Number)?;
        *value = text
            .parse::<f64>()
            .map_err(|_| self.fail("expected a number", node.start))?;
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        let (node, _) = self.scalar_text(NodeKind::String)?;
        *value = unescape(self.text, node.start, node.end)?;
        Ok(())
    }

    fn begin_child(&mut self) -> SyncResult<()> {
        let node = self.current()?;
        if node.kind != NodeKind::Object {
            return Err(self.fail("expected an object", node.start));
        }
        self.frames.push(JsonFrame {
            container: self.cur,
            next: self.cur + 1,
            pending_key: 0,
        });
        Ok(())
    }

    fn end_child(&mut self) -> SyncResult<()> {
        self.frames.pop();
        Ok(())
    }

    fn sync_subtype(&mut self, root: TypeId, tag: &mut u32) -> SyncResult<()> {
        let Some((global_id, name)) = self.read_wrapper()? else {
            *tag = 0;
            return Ok(());
        };
        if self.registry.global_of(root) != Some(global_id) {
            return Err(SyncError::GlobalRootMismatch {
                requested: self.registry.root_name(root).unwrap_or("?").into(),
                global_id,
            });
        }
        *tag = self
            .registry
            .subtype_tag_by_name(root, &name)
            .ok_or_else(|| SyncError::UnknownSubtypeName {
                root: self.registry.root_name(root).unwrap_or("?").into(),
                name,
                path: self.path.render(),
            })?;
        Ok(())
    }

    fn begin_list(
        &mut self,
        len: &mut usize,
        _element: WireCategory,
        _nullable: bool,
    ) -> SyncResult<()> {
        let node = self.current()?;
        if node.kind != NodeKind::Array {
            return Err(self.fail("expected an array", node.start));
        }
        *len = node.count;
        self.frames.push(JsonFrame {
            container: self.cur,
            next: self.cur + 1,
            pending_key: 0,
        });
        Ok(())
    }

    fn end_list(&mut self) -> SyncResult<()> {
        self.frames.pop();
        Ok(())
    }

    fn begin_element(&mut self, index: usize) -> SyncResult<()> {
        let (container, next) = match self.frames.last() {
            Some(frame) => (frame.container, frame.next),
            None => return Err(self.fail("no open container", 0)),
        };
        let kind = self.node(container)?.kind;
        match kind {
            NodeKind::Array => {
                let span = self.node(next)?.span;
                self.cur = next;
                if let Some(frame) = self.frames.last_mut() {
                    frame.next = next + span;
                }
            }
            NodeKind::Object => {
                let value = next + 1;
                let span = self.node(value)?.span;
                self.cur = value;
                if let Some(frame) = self.frames.last_mut() {
                    frame.pending_key = next;
                    frame.next = value + span;
                }
            }
            _ => return Err(self.fail("no open container", 0)),
        }
        self.path.push(PathSegment::Index(index));
        Ok(())
    }

    fn end_element(&mut self, _index: usize) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        *null = self.current()?.kind == NodeKind::Null;
        Ok(())
    }

    fn begin_map(
        &mut self,
        len: &mut usize,
        _key: WireCategory,
        _value: WireCategory,
    ) -> SyncResult<()> {
        let node = self.current()?;
        if node.kind != NodeKind::Object {
            return Err(self.fail("expected an object", node.start));
        }
        *len = node.count;
        self.frames.push(JsonFrame {
            container: self.cur,
            next: self.cur + 1,
            pending_key: 0,
        });
        Ok(())
    }

    fn end_map(&mut self) -> SyncResult<()> {
        self.frames.pop();
        Ok(())
    }

    fn begin_key(&mut self) -> SyncResult<()> {
        if let Some(frame) = self.frames.last() {
            self.cur = frame.pending_key;
        }
        self.key_mode = true;
        Ok(())
    }

    fn end_key(&mut self) -> SyncResult<()> {
        if let Some(frame) = self.frames.last() {
            self.cur = frame.pending_key + 1;
        }
        self.key_mode = false;
        Ok(())
    }
}
