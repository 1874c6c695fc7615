//! Nested lexical scopes for symbol resolution.
//!
//! Scopes form a tree via parent indices into an arena, never cyclic
//! references, so a child can look a symbol up through its ancestors
//! without any scope owning another.

use std::collections::HashMap;

use crate::messages::Location;

/// A resolved or deferred symbol value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue {
    Address(u32),
    Constant(i64),
}

#[derive(Debug, Clone)]
struct Symbol {
    location: Location,
    value: SymbolValue,
}

/// One lexical scope: a symbol table plus an index to its parent, if any.
#[derive(Debug, Default)]
struct ScopeNode {
    parent: Option<usize>,
    symbols: HashMap<String, Symbol>,
}

/// An arena of scopes, rooted at index 0.
#[derive(Debug)]
pub struct ScopeArena {
    nodes: Vec<ScopeNode>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![ScopeNode::default()],
        }
    }

    #[must_use]
    pub fn root(&self) -> usize {
        0
    }

    /// Creates a new scope nested inside `parent`, returning its index.
    pub fn push_child(&mut self, parent: usize) -> usize {
        self.nodes.push(ScopeNode {
            parent: Some(parent),
            symbols: HashMap::new(),
        });
        self.nodes.len() - 1
    }

    /// Defines `name` in `scope`. Fails with the original location if the
    /// symbol is already defined in that exact scope (shadowing an outer
    /// scope's symbol is allowed; redefining within the same scope is not).
    pub fn define(&mut self, scope: usize, name: &str, location: Location, value: SymbolValue) -> Result<(), Location> {
        if let Some(existing) = self.nodes[scope].symbols.get(name) {
            return Err(existing.location.clone());
        }
        self.nodes[scope].symbols.insert(
            name.to_string(),
            Symbol { location, value },
        );
        Ok(())
    }

    /// Looks up `name` starting at `scope`, walking up through parents.
    #[must_use]
    pub fn lookup(&self, scope: usize, name: &str) -> Option<SymbolValue> {
        let mut current = Some(scope);
        while let Some(idx) = current {
            if let Some(symbol) = self.nodes[idx].symbols.get(name) {
                return Some(symbol.value);
            }
            current = self.nodes[idx].parent;
        }
        None
    }

    #[must_use]
    pub fn is_defined_in_scope(&self, scope: usize, name: &str) -> bool {
        self.nodes[scope].symbols.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_sees_parent_symbols() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena
            .define(root, "BASE", Location::default(), SymbolValue::Address(0x8000))
            .unwrap();

        let child = arena.push_child(root);
        assert_eq!(arena.lookup(child, "BASE"), Some(SymbolValue::Address(0x8000)));
    }

    #[test]
    fn redefinition_in_same_scope_fails_with_original_location() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let first_loc = Location::new("a.s", 1, 0);
        arena.define(root, "X", first_loc.clone(), SymbolValue::Constant(1)).unwrap();

        let err = arena
            .define(root, "X", Location::new("a.s", 2, 0), SymbolValue::Constant(2))
            .unwrap_err();
        assert_eq!(err, first_loc);
    }

    #[test]
    fn shadowing_in_child_scope_is_allowed() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena.define(root, "X", Location::default(), SymbolValue::Constant(1)).unwrap();
        let child = arena.push_child(root);
        arena.define(child, "X", Location::default(), SymbolValue::Constant(2)).unwrap();
        assert_eq!(arena.lookup(child, "X"), Some(SymbolValue::Constant(2)));
        assert_eq!(arena.lookup(root, "X"), Some(SymbolValue::Constant(1)));
    }
}
