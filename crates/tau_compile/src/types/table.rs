//! The type table: AST node identity → type descriptor.
//!
//! One entry per typed node. Inserting over an existing entry replaces it
//! and returns the old descriptor, which the passes use to keep re-runs
//! idempotent.

use std::collections::HashMap;

use tau_language::NodeId;

use super::desc::TypeId;

#[derive(Default)]
pub struct TypeTable {
    entries: HashMap<NodeId, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(16),
        }
    }

    /// Binds `node` to `desc`, returning the previous binding if any.
    pub fn insert(&mut self, node: NodeId, desc: TypeId) -> Option<TypeId> {
        self.entries.insert(node, desc)
    }

    pub fn lookup(&self, node: NodeId) -> Option<TypeId> {
        self.entries.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, TypeId)> + '_ {
        self.entries.iter().map(|(&node, &desc)| (node, desc))
    }
}
