use crate::error::SyncResult;
use crate::registry::SchemaRegistry;

/// One deferred registration callback.
///
/// Hosts hand these to [`SchemaRegistry::add_bootstrap`] (or submit them via
/// [`inventory`] when the `auto_register` feature is on) and the registry
/// runs each exactly once from
/// [`ensure_bootstrapped`](SchemaRegistry::ensure_bootstrapped).
///
/// # Examples
///
/// ```
/// use sk_sync::{SchemaBootstrap, SchemaRegistry, SyncResult};
///
/// fn install(registry: &mut SchemaRegistry) -> SyncResult<()> {
///     // registry.register::<Item>("Item"), ...
///     Ok(())
/// }
///
/// let mut registry = SchemaRegistry::new();
/// registry.add_bootstrap(SchemaBootstrap::new("demo", install));
/// registry.ensure_bootstrapped().unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SchemaBootstrap {
    name: &'static str,
    install: fn(&mut SchemaRegistry) -> SyncResult<()>,
}

impl SchemaBootstrap {
    /// Creates a bootstrap with a diagnostic name and its install callback.
    pub const fn new(
        name: &'static str,
        install: fn(&mut SchemaRegistry) -> SyncResult<()>,
    ) -> Self {
        Self { name, install }
    }

    /// The diagnostic name, used in bootstrap logging.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn run(&self, registry: &mut SchemaRegistry) -> SyncResult<()> {
        (self.install)(registry)
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(SchemaBootstrap);
