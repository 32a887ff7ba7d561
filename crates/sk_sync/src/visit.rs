//! The generic visitor: the same traversal the codecs run, surfaced as
//! begin/end callbacks with a rendered path per node.

use crate::error::SyncResult;
use crate::path::{FieldPath, PathSegment};
use crate::registry::SchemaRegistry;
use crate::sync::{Syncable, Syncer};
use crate::wire::WireCategory;

/// Callbacks invoked for every present field and element, in declared
/// order. `path` already contains the entered segment, so rendering it
/// inside [`enter`](Self::enter) yields locations like `inventory[3].name`.
pub trait Visit {
    fn enter(&mut self, segment: PathSegment, path: &FieldPath);

    fn leave(&mut self, segment: PathSegment, path: &FieldPath) {
        let _ = (segment, path);
    }
}

/// Walks a value's delegate tree, reporting each node to `visitor`.
/// Default-valued fields are elided exactly as the codecs elide them.
pub fn visit<T: Syncable>(
    registry: &SchemaRegistry,
    value: &mut T,
    visitor: &mut dyn Visit,
) -> SyncResult<()> {
    let mut driver = VisitSyncer {
        registry,
        visitor,
        path: FieldPath::new(),
    };
    T::sync(&mut driver, value)
}

struct VisitSyncer<'r, 'v> {
    registry: &'r SchemaRegistry,
    visitor: &'v mut dyn Visit,
    path: FieldPath,
}

impl VisitSyncer<'_, '_> {
    fn enter(&mut self, segment: PathSegment) {
        self.path.push(segment);
        self.visitor.enter(segment, &self.path);
    }

    fn leave(&mut self) {
        if let Some(segment) = self.path.pop() {
            self.path.push(segment);
            self.visitor.leave(segment, &self.path);
            self.path.pop();
        }
    }
}

impl Syncer for VisitSyncer<'_, '_> {
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
        self.enter(PathSegment::Field(name));
        Ok(true)
    }

    fn leave_field(&mut self) -> SyncResult<()> {
        self.leave();
        Ok(())
    }

    fn begin_element(&mut self, index: usize) -> SyncResult<()> {
        self.enter(PathSegment::Index(index));
        Ok(())
    }

    fn end_element(&mut self, _index: usize) -> SyncResult<()> {
        self.leave();
        Ok(())
    }
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::*;

    #[derive(Default)]
    struct Trace {
        entered: Vec<String>,
    }

    impl Visit for Trace {
        fn enter(&mut self, _segment: PathSegment, path: &FieldPath) {
            self.entered.push(path.render());
        }
    }

    #[test]
    fn nodes_arrive_in_declared_order_with_indices() {
        let registry = fixture_registry();
        let mut inventory = Inventory {
            owner: String::from("Asha"),
            items: vec![
                Item {
                    name: String::from("Sword"),
                    ..Item::default()
                },
                Item {
                    count: 2,
                    ..Item::default()
                },
            ],
            gold: 5,
            ..Inventory::default()
        };
        let mut trace = Trace::default();
        visit(&registry, &mut inventory, &mut trace).unwrap();
        assert_eq!(
            trace.entered,
            [
                "owner",
                "items",
                "items[0]",
                "items[0].name",
                "items[1]",
                "items[1].count",
                "gold",
            ]
        );
    }

    #[test]
    fn elided_fields_are_not_visited() {
        let registry = fixture_registry();
        let mut item = Item::default();
        let mut trace = Trace::default();
        visit(&registry, &mut item, &mut trace).unwrap();
        assert!(trace.entered.is_empty());
    }
}
