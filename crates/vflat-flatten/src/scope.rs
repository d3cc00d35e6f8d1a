//! Per-unit symbol table
//!
//! A [`ScopeTable`] maps symbol names to the node that declares them while
//! one elaboration unit is being flattened. Entries are plain node ids into
//! the arena; the table never owns the declarations.

use indexmap::IndexMap;
use vflat_ast::{Ast, NodeId, NodeKind};

/// Symbol table bound to one elaboration unit
#[derive(Debug, Clone)]
pub struct ScopeTable {
    unit: NodeId,
    symbols: IndexMap<String, NodeId>,
}

impl ScopeTable {
    /// Start a table for `unit`
    pub fn enter(unit: NodeId) -> Self {
        Self {
            unit,
            symbols: IndexMap::new(),
        }
    }

    /// End the unit's lifetime, dropping every entry
    pub fn leave(self) {
        log::trace!(
            "leaving scope of unit {:?} with {} symbols",
            self.unit,
            self.symbols.len()
        );
    }

    /// Unit this table belongs to
    pub fn unit(&self) -> NodeId {
        self.unit
    }

    /// Bind `name`, returning the previous binding if it was shadowed
    pub fn insert(&mut self, name: impl Into<String>, node: NodeId) -> Option<NodeId> {
        self.symbols.insert(name.into(), node)
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.symbols.get(name).copied()
    }

    /// Body of the typedef bound to `name`: its struct, union, enum or vector
    pub fn lookup_type(&self, ast: &Ast, name: &str) -> Option<NodeId> {
        let node = ast.get(self.lookup(name)?)?;
        if node.kind != NodeKind::Typedef {
            return None;
        }
        node.children.first().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Import the constants and type definitions of a package
    ///
    /// Typedefs, parameters and localparams are bound both as `pkg::name`
    /// and as `name`; enums also bind each of their items. Variables are
    /// never imported. Returns the number of imported declarations.
    pub fn import_package(&mut self, ast: &Ast, package: NodeId) -> usize {
        let pkg = &ast[package];
        let mut imported = 0;
        for &child in &pkg.children {
            let node = &ast[child];
            match node.kind {
                NodeKind::Typedef | NodeKind::Parameter | NodeKind::LocalParam => {
                    self.insert(format!("{}::{}", pkg.name, node.name), child);
                    self.insert(node.name.clone(), child);
                    if node.kind == NodeKind::Typedef {
                        if let Some(&body) = node.children.first() {
                            self.import_enum_items(ast, &pkg.name, body);
                        }
                    }
                    imported += 1;
                }
                NodeKind::Enum => {
                    if !node.name.is_empty() {
                        self.insert(format!("{}::{}", pkg.name, node.name), child);
                        self.insert(node.name.clone(), child);
                    }
                    self.import_enum_items(ast, &pkg.name, child);
                    imported += 1;
                }
                _ => {}
            }
        }
        imported
    }

    fn import_enum_items(&mut self, ast: &Ast, package: &str, enum_node: NodeId) {
        let node = &ast[enum_node];
        if node.kind != NodeKind::Enum {
            return;
        }
        for &item in &node.children {
            let item_node = &ast[item];
            if item_node.kind == NodeKind::EnumItem {
                self.insert(format!("{}::{}", package, item_node.name), item);
                self.insert(item_node.name.clone(), item);
            }
        }
    }
}
