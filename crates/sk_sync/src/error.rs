use std::borrow::Cow;
use std::{error, fmt};

use crate::wire::WireCategory;

// -----------------------------------------------------------------------------
// MalformedKind

/// What exactly was wrong with a binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// A varint ran past its maximum width or past the end of the buffer.
    UnterminatedVarint,
    /// A length-prefixed payload claimed more bytes than remain.
    TruncatedPayload,
    /// A length-prefixed string was not valid UTF-8.
    InvalidUtf8,
    /// The buffer ended inside a composite frame.
    UnexpectedEof,
    /// Bytes remained after the top-level frame was fully consumed.
    TrailingBytes,
    /// A list null flag byte was neither 0 nor 1.
    InvalidNullFlag,
    /// A frame did not start with the expected marker, or element framing
    /// disagreed with the declared schema.
    CategoryMismatch {
        expected: WireCategory,
        found: WireCategory,
    },
    /// A reserved bit was set in a list or dictionary info byte.
    InvalidInfoByte,
    /// Nesting exceeded the decoder's depth limit.
    DepthLimit,
    /// A scalar did not fit the declared field width.
    ValueOutOfRange,
    /// A non-finite float cannot be represented in JSON.
    NonFiniteNumber,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedVarint => f.write_str("non-terminating varint"),
            Self::TruncatedPayload => f.write_str("truncated length-prefixed payload"),
            Self::InvalidUtf8 => f.write_str("string payload is not valid UTF-8"),
            Self::UnexpectedEof => f.write_str("unexpected end of input"),
            Self::TrailingBytes => f.write_str("trailing bytes after top-level frame"),
            Self::InvalidNullFlag => f.write_str("invalid null flag"),
            Self::CategoryMismatch { expected, found } => {
                write!(f, "expected {expected:?} framing, found {found:?}")
            }
            Self::InvalidInfoByte => f.write_str("reserved bit set in framing info byte"),
            Self::DepthLimit => f.write_str("nesting depth limit exceeded"),
            Self::ValueOutOfRange => f.write_str("scalar value out of range"),
            Self::NonFiniteNumber => f.write_str("non-finite float is not representable"),
        }
    }
}

// -----------------------------------------------------------------------------
// SyncError

/// Convenience alias used by every driver and registry operation.
pub type SyncResult<T> = Result<T, SyncError>;

/// The error taxonomy of the engine.
///
/// Registration conflicts surface at registration time, everything else at
/// the point of failure inside a traversal. Reference misses are *not*
/// errors; [`ReferenceTable::get`](crate::refs::ReferenceTable::get) returns
/// `None` for them.
///
/// Decode errors carry the field path of the failure (rendered the same way
/// the generic visitor renders node paths) so a human can locate the
/// offending value.
#[derive(Debug)]
pub enum SyncError {
    /// A type was used before any bootstrap registered it.
    UnregisteredType { type_name: Cow<'static, str> },
    /// A global ID is already bound to a different root type.
    GlobalIdConflict {
        global_id: u32,
        existing: Cow<'static, str>,
        incoming: Cow<'static, str>,
    },
    /// No root type is bound to this global ID.
    UnknownGlobalId { global_id: u32 },
    /// A global payload carried a different root than the one requested.
    GlobalRootMismatch {
        requested: Cow<'static, str>,
        global_id: u32,
    },
    /// A subtype tag is already bound to a different subtype of the same root.
    SubtypeTagConflict {
        root: Cow<'static, str>,
        tag: u32,
        existing: Cow<'static, str>,
        incoming: Cow<'static, str>,
    },
    /// Subtype tag 0 denotes the root itself and cannot be assigned.
    ReservedSubtypeTag { root: Cow<'static, str> },
    /// Some other registration invariant was violated.
    RegistrationConflict { detail: String },
    /// A polymorphic payload carried a tag absent from the subtype table.
    UnknownSubtypeTag {
        root: Cow<'static, str>,
        tag: u32,
        path: String,
    },
    /// A JSON global-type wrapper named a subtype absent from the table.
    UnknownSubtypeName {
        root: Cow<'static, str>,
        name: String,
        path: String,
    },
    /// A non-concrete root was requested with no wrapper or tag to pick the
    /// concrete subtype.
    AmbiguousRoot { root: Cow<'static, str> },
    /// The global-type wrapper key was declared as an ordinary field.
    ReservedFieldName { name: &'static str },
    /// Field tag 0 is the end-of-child marker and cannot be declared.
    ReservedFieldTag { name: &'static str },
    /// Fields must be declared in ascending tag order.
    NonAscendingTag { name: &'static str, tag: u16 },
    /// A decoded enum index had no registered variant.
    UnknownEnumValue {
        enum_name: &'static str,
        value: i32,
        path: String,
    },
    /// The top-level value of an encode call was not a composite.
    NotComposite { type_name: &'static str },
    /// A binary payload violated its own framing.
    Malformed {
        kind: MalformedKind,
        offset: usize,
        path: String,
    },
    /// A JSON document violated the format contract.
    MalformedJson {
        detail: Cow<'static, str>,
        offset: usize,
        path: String,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredType { type_name } => {
                write!(f, "type `{type_name}` is not registered")
            }
            Self::GlobalIdConflict {
                global_id,
                existing,
                incoming,
            } => write!(
                f,
                "global type id {global_id} is bound to `{existing}`, cannot rebind to `{incoming}`"
            ),
            Self::UnknownGlobalId { global_id } => {
                write!(f, "no root type is registered under global id {global_id}")
            }
            Self::GlobalRootMismatch {
                requested,
                global_id,
            } => write!(
                f,
                "payload carries global id {global_id}, which is not root `{requested}`"
            ),
            Self::SubtypeTagConflict {
                root,
                tag,
                existing,
                incoming,
            } => write!(
                f,
                "subtype tag {tag} of `{root}` is bound to `{existing}`, cannot rebind to `{incoming}`"
            ),
            Self::ReservedSubtypeTag { root } => {
                write!(f, "subtype tag 0 of `{root}` is reserved for the root itself")
            }
            Self::RegistrationConflict { detail } => write!(f, "registration conflict: {detail}"),
            Self::UnknownSubtypeTag { root, tag, path } => {
                write!(f, "unknown subtype tag {tag} for root `{root}` at `{path}`")
            }
            Self::UnknownSubtypeName { root, name, path } => {
                write!(f, "unknown subtype `{name}` for root `{root}` at `{path}`")
            }
            Self::AmbiguousRoot { root } => write!(
                f,
                "root `{root}` is not concrete and no subtype was specified"
            ),
            Self::ReservedFieldName { name } => {
                write!(f, "`{name}` is reserved and cannot be a field name")
            }
            Self::ReservedFieldTag { name } => {
                write!(f, "field `{name}` cannot use reserved tag 0")
            }
            Self::NonAscendingTag { name, tag } => {
                write!(f, "field `{name}` (tag {tag}) is not in ascending tag order")
            }
            Self::UnknownEnumValue {
                enum_name,
                value,
                path,
            } => write!(
                f,
                "enum `{enum_name}` has no variant with index {value} at `{path}`"
            ),
            Self::NotComposite { type_name } => {
                write!(f, "`{type_name}` is not a composite and cannot be a root value")
            }
            Self::Malformed { kind, offset, path } => {
                write!(f, "malformed wire data at byte {offset} (`{path}`): {kind}")
            }
            Self::MalformedJson {
                detail,
                offset,
                path,
            } => write!(f, "malformed JSON at byte {offset} (`{path}`): {detail}"),
        }
    }
}

impl error::Error for SyncError {}
