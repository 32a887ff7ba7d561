//! The schema registry: type descriptors, per-root subtype tables, the
//! global type table and deferred bootstrap registration.

mod bootstrap;
mod descriptor;
mod global;
mod schema_registry;

pub use bootstrap::SchemaBootstrap;
pub use descriptor::TypeDescriptor;
pub use global::GlobalValue;
pub use schema_registry::SchemaRegistry;
