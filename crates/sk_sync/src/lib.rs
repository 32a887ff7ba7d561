#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Modules

mod error;
mod path;
mod wire;

pub mod binary;
pub mod hash;
pub mod json;
pub mod pool;
pub mod refs;
pub mod registry;
pub mod sync;
pub mod visit;

#[cfg(test)]
mod fixture;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use error::{MalformedKind, SyncError, SyncResult};
pub use path::{FieldPath, PathSegment};
pub use registry::{GlobalValue, SchemaBootstrap, SchemaRegistry, TypeDescriptor};
pub use sync::{PolySync, SyncEnum, SyncKey, SyncOps, Syncable, Syncer};
pub use wire::WireCategory;
