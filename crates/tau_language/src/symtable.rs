//! Scoped symbol table.
//!
//! Scopes form a tree: each scope holds a weak link to its parent (an id)
//! and owns its children list, so dropping the tree releases everything
//! transitively. A symbol binds an identifier to the AST node that declared
//! it.
//!
//! Three lookup flavours matter to the passes:
//!
//! - [`ScopeTree::insert`] returns the *first* existing entry on collision
//!   so redeclarations can report both locations,
//! - [`ScopeTree::get`] searches exactly one scope,
//! - [`ScopeTree::lookup`] climbs to the root (used to detect legal
//!   cross-scope shadowing and resolve identifier uses).

use std::collections::HashMap;

use tau_base::Symbol;

use crate::ast::NodeId;

/// Identity of a scope within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(index: usize) -> Self {
        ScopeId(index as u32)
    }
}

/// An identifier bound to its declaring AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: Symbol,
    pub node: NodeId,
}

struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: HashMap<Symbol, SymbolEntry>,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            symbols: HashMap::with_capacity(16),
        }
    }
}

/// The scope tree of a translation unit.
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// Creates a tree containing only the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a child scope under `parent`.
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent)));
        self.scopes[parent.index()].children.push(id);
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.index()].parent
    }

    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        &self.scopes[scope.index()].children
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        false
    }

    /// Inserts `entry` into `scope`.
    ///
    /// On collision the existing entry wins and is returned so the caller
    /// can report a redeclaration; the table is left unchanged.
    pub fn insert(&mut self, scope: ScopeId, entry: SymbolEntry) -> Option<SymbolEntry> {
        let symbols = &mut self.scopes[scope.index()].symbols;
        if let Some(existing) = symbols.get(&entry.name) {
            return Some(*existing);
        }
        symbols.insert(entry.name, entry);
        None
    }

    /// Searches exactly one scope.
    pub fn get(&self, scope: ScopeId, name: Symbol) -> Option<SymbolEntry> {
        self.scopes[scope.index()].symbols.get(&name).copied()
    }

    /// Searches `scope` and every ancestor up to the root.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<SymbolEntry> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(entry) = self.get(id, name) {
                return Some(entry);
            }
            current = self.parent(id);
        }
        None
    }

    /// Like [`lookup`](Self::lookup), but skips the innermost scope.
    ///
    /// Used to distinguish a legal shadow (binding visible in an ancestor)
    /// from a plain new name.
    pub fn lookup_outer(&self, scope: ScopeId, name: Symbol) -> Option<SymbolEntry> {
        self.parent(scope)
            .and_then(|parent| self.lookup(parent, name))
    }

    /// Splices another tree under this tree's root.
    ///
    /// All scope ids of `src` are remapped by a fixed offset; symbol nodes
    /// are shifted by `node_offset` and symbol names pass through
    /// `map_name`, so entries address the destination AST and interner
    /// after an environment merge. Returns the remapped id of the source
    /// root, which becomes a child of the destination root.
    pub fn merge(
        &mut self,
        src: ScopeTree,
        node_offset: usize,
        mut map_name: impl FnMut(Symbol) -> Symbol,
    ) -> ScopeId {
        let scope_offset = self.scopes.len() as u32;
        let remap = |id: ScopeId| ScopeId(id.0 + scope_offset);

        for scope in src.scopes {
            let mut mapped = Scope::new(scope.parent.map(remap));
            mapped.children = scope.children.iter().map(|&c| remap(c)).collect();
            for entry in scope.symbols.into_values() {
                let name = map_name(entry.name);
                mapped.symbols.insert(
                    name,
                    SymbolEntry {
                        name,
                        node: NodeId::from_index(entry.node.index() + node_offset),
                    },
                );
            }
            self.scopes.push(mapped);
        }

        let src_root = ScopeId(scope_offset);
        self.scopes[src_root.index()].parent = Some(self.root());
        let root = self.root();
        self.scopes[root.index()].children.push(src_root);
        src_root
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tau_base::Interner;

    fn entry(interner: &mut Interner, name: &str, index: usize) -> SymbolEntry {
        SymbolEntry {
            name: interner.intern(name),
            node: NodeId::from_index(index),
        }
    }

    #[test]
    fn insert_then_get_finds_symbol() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let sym = entry(&mut interner, "x", 0);
        assert!(tree.insert(tree.root(), sym).is_none());
        assert_eq!(tree.get(tree.root(), sym.name), Some(sym));
    }

    #[test]
    fn insert_collision_returns_first_entry() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let first = entry(&mut interner, "x", 0);
        let second = entry(&mut interner, "x", 1);

        assert!(tree.insert(tree.root(), first).is_none());
        assert_eq!(tree.insert(tree.root(), second), Some(first));
        // First entry still wins.
        assert_eq!(tree.get(tree.root(), first.name), Some(first));
    }

    #[test]
    fn get_does_not_climb() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let sym = entry(&mut interner, "x", 0);
        tree.insert(tree.root(), sym);

        let child = tree.push_child(tree.root());
        assert_eq!(tree.get(child, sym.name), None);
    }

    #[test]
    fn lookup_climbs_to_root() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let sym = entry(&mut interner, "x", 0);
        tree.insert(tree.root(), sym);

        let child = tree.push_child(tree.root());
        let grandchild = tree.push_child(child);
        assert_eq!(tree.lookup(grandchild, sym.name), Some(sym));
    }

    #[test]
    fn lookup_prefers_innermost_binding() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let outer = entry(&mut interner, "x", 0);
        let child = tree.push_child(tree.root());
        let inner = entry(&mut interner, "x", 1);

        tree.insert(tree.root(), outer);
        tree.insert(child, inner);
        assert_eq!(tree.lookup(child, outer.name), Some(inner));
    }

    #[test]
    fn lookup_outer_skips_innermost_scope() {
        let mut interner = Interner::new();
        let mut tree = ScopeTree::new();
        let outer = entry(&mut interner, "x", 0);
        tree.insert(tree.root(), outer);

        let child = tree.push_child(tree.root());
        let inner = entry(&mut interner, "x", 1);
        tree.insert(child, inner);

        assert_eq!(tree.lookup_outer(child, outer.name), Some(outer));
    }

    #[test]
    fn merge_reparents_source_root_under_destination() {
        let mut interner = Interner::new();
        let mut dest = ScopeTree::new();
        let mut src = ScopeTree::new();

        let sym = entry(&mut interner, "imported", 3);
        src.insert(src.root(), sym);
        let src_child = src.push_child(src.root());
        src.insert(src_child, entry(&mut interner, "local", 4));

        let mapped_root = dest.merge(src, 10, |name| name);

        assert_eq!(dest.parent(mapped_root), Some(dest.root()));
        assert!(dest.children(dest.root()).contains(&mapped_root));

        // Node ids were shifted by the offset.
        let found = dest.get(mapped_root, sym.name).unwrap();
        assert_eq!(found.node, NodeId::from_index(13));

        // Symbols merged under the destination root resolve via lookup from
        // the re-parented subtree.
        let inner = dest.children(mapped_root)[0];
        assert_eq!(dest.lookup(inner, sym.name), Some(found));
    }
}
