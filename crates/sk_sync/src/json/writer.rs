use std::any::TypeId;
use std::fmt::Write as _;

use crate::error::{MalformedKind, SyncError, SyncResult};
use crate::json::GLOBAL_TYPE_KEY;
use crate::path::{FieldPath, PathSegment};
use crate::registry::SchemaRegistry;
use crate::sync::{PolySync, Syncable, Syncer};
use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// JsonWriter

/// The JSON encoder.
///
/// Output follows a byte-exact contract so goldens and diffs are stable:
/// one tab per nesting level, every member and element on its own line,
/// `": "` after keys, fields in declared order, empty composites as
/// `{}`/`[]`, no trailing newline. Default-valued fields are elided exactly
/// as in the binary codec.
///
/// # Examples
///
/// ```
/// use sk_sync::json::JsonWriter;
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
/// let mut writer = JsonWriter::new(&registry);
/// let mut item = Item { name: "Sword".into() };
/// assert_eq!(writer.encode(&mut item).unwrap(), "{\n\t\"name\": \"Sword\"\n}");
/// ```
pub struct JsonWriter<'r> {
    registry: &'r SchemaRegistry,
    out: String,
    /// Member/element count per open container.
    frames: Vec<usize>,
    key_mode: bool,
    path: FieldPath,
}

impl<'r> JsonWriter<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            out: String::new(),
            frames: Vec::new(),
            key_mode: false,
            path: FieldPath::new(),
        }
    }

    /// Encodes a composite value as a plain JSON object.
    pub fn encode<T: Syncable>(&mut self, value: &mut T) -> SyncResult<&str> {
        if T::CATEGORY != WireCategory::Child {
            return Err(SyncError::NotComposite {
                type_name: std::any::type_name::<T>(),
            });
        }
        self.reset();
        self.begin_child()?;
        T::sync(self, value)?;
        self.end_child()?;
        Ok(&self.out)
    }

    /// Encodes a value of registered root `R` with the global-type wrapper
    /// as its first member, so a reader needs no compile-time type.
    pub fn encode_global<R: PolySync + ?Sized>(&mut self, value: &mut R) -> SyncResult<&str> {
        let root = TypeId::of::<R>();
        let mut tag = self
            .registry
            .subtype_tag(root, value.poly_type_id())
            .ok_or_else(|| SyncError::UnregisteredType {
                type_name: value.poly_type_name().into(),
            })?;
        self.reset();
        self.begin_child()?;
        self.sync_subtype(root, &mut tag)?;
        value.poly_sync(self)?;
        self.end_child()?;
        Ok(&self.out)
    }

    fn reset(&mut self) {
        self.out.clear();
        self.frames.clear();
        self.key_mode = false;
    }

    /// Newline + indentation + separator bookkeeping before one member or
    /// element of the innermost container.
    fn open_slot(&mut self) {
        let depth = self.frames.len();
        if let Some(count) = self.frames.last_mut() {
            if *count > 0 {
                self.out.push(',');
            }
            *count += 1;
        }
        self.out.push('\n');
        for _ in 0..depth {
            self.out.push('\t');
        }
    }

    fn member(&mut self, name: &str) {
        self.open_slot();
        self.push_quoted(name);
        self.out.push_str(": ");
    }

    fn push_quoted(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                '\u{0008}' => self.out.push_str("\\b"),
                '\u{000C}' => self.out.push_str("\\f"),
                c if (c as u32) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    /// Scalars become member keys while a dictionary key is open.
    fn push_number(&mut self, text: &str) {
        if self.key_mode {
            self.out.push('"');
            self.out.push_str(text);
            self.out.push_str("\": ");
        } else {
            self.out.push_str(text);
        }
    }

    fn non_finite(&self) -> SyncError {
        SyncError::Malformed {
            kind: MalformedKind::NonFiniteNumber,
            offset: self.out.len(),
            path: self.path.render(),
        }
    }
}

impl Syncer for JsonWriter<'_> {
    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    fn as_dyn(&mut self) -> &mut (dyn Syncer + '_) {
        self
    }

    fn enter_field(
        &mut self,
        _tag: u16,
        name: &'static str,
        _category: WireCategory,
        present: bool,
    ) -> SyncResult<bool> {
        if !present {
            return Ok(false);
        }
        self.member(name);
        self.path.push(PathSegment::Field(name));
        Ok(true)
    }

    fn leave_field(&mut self) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_bool(&mut self, value: &mut bool) -> SyncResult<()> {
        let text = if *value { "true" } else { "false" };
        self.push_number(text);
        Ok(())
    }

    fn sync_i32(&mut self, value: &mut i32) -> SyncResult<()> {
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_u32(&mut self, value: &mut u32) -> SyncResult<()> {
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_i64(&mut self, value: &mut i64) -> SyncResult<()> {
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_u64(&mut self, value: &mut u64) -> SyncResult<()> {
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_f32(&mut self, value: &mut f32) -> SyncResult<()> {
        if !value.is_finite() {
            return Err(self.non_finite());
        }
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_f64(&mut self, value: &mut f64) -> SyncResult<()> {
        if !value.is_finite() {
            return Err(self.non_finite());
        }
        self.push_number(&value.to_string());
        Ok(())
    }

    fn sync_string(&mut self, value: &mut String) -> SyncResult<()> {
        if self.key_mode {
            self.push_quoted(value);
            self.out.push_str(": ");
        } else {
            self.push_quoted(value);
        }
        Ok(())
    }

    fn begin_child(&mut self) -> SyncResult<()> {
        self.out.push('{');
        self.frames.push(0);
        Ok(())
    }

    fn end_child(&mut self) -> SyncResult<()> {
        let count = self.frames.pop().unwrap_or(0);
        if count > 0 {
            self.out.push('\n');
            for _ in 0..self.frames.len() {
                self.out.push('\t');
            }
        }
        self.out.push('}');
        Ok(())
    }

    /// Emits the reserved wrapper member `"-globalType": "<id>:<name>"` as
    /// the first member of the open object.
    fn sync_subtype(&mut self, root: TypeId, tag: &mut u32) -> SyncResult<()> {
        let global_id = self
            .registry
            .global_of(root)
            .ok_or_else(|| SyncError::UnregisteredType {
                type_name: self
                    .registry
                    .root_name(root)
                    .unwrap_or("unregistered root")
                    .into(),
            })?;
        let name = self.registry.subtype_name(root, *tag).ok_or_else(|| {
            SyncError::UnknownSubtypeTag {
                root: self.registry.root_name(root).unwrap_or("?").into(),
                tag: *tag,
                path: self.path.render(),
            }
        })?;
        self.member(GLOBAL_TYPE_KEY);
        self.push_quoted(&format!("{global_id}:{name}"));
        Ok(())
    }

    fn begin_list(
        &mut self,
        _len: &mut usize,
        _element: WireCategory,
        _nullable: bool,
    ) -> SyncResult<()> {
        self.out.push('[');
        self.frames.push(0);
        Ok(())
    }

    fn end_list(&mut self) -> SyncResult<()> {
        let count = self.frames.pop().unwrap_or(0);
        if count > 0 {
            self.out.push('\n');
            for _ in 0..self.frames.len() {
                self.out.push('\t');
            }
        }
        self.out.push(']');
        Ok(())
    }

    fn begin_element(&mut self, index: usize) -> SyncResult<()> {
        self.open_slot();
        self.path.push(PathSegment::Index(index));
        Ok(())
    }

    fn end_element(&mut self, _index: usize) -> SyncResult<()> {
        self.path.pop();
        Ok(())
    }

    fn sync_null(&mut self, null: &mut bool) -> SyncResult<()> {
        if *null {
            self.out.push_str("null");
        }
        Ok(())
    }

    fn begin_map(
        &mut self,
        _len: &mut usize,
        _key: WireCategory,
        _value: WireCategory,
    ) -> SyncResult<()> {
        self.out.push('{');
        self.frames.push(0);
        Ok(())
    }

    fn end_map(&mut self) -> SyncResult<()> {
        self.end_child()
    }

    fn begin_key(&mut self) -> SyncResult<()> {
        self.key_mode = true;
        Ok(())
    }

    fn end_key(&mut self) -> SyncResult<()> {
        self.key_mode = false;
        Ok(())
    }
}
