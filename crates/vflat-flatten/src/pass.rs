//! Scope-threading flatten pass
//!
//! One depth-first walk over an elaboration unit. On the way down, field
//! accesses (`s.a.b`) are expanded to flat ranges. On the way up, declarations
//! are entered into the scope table and normalized, and indexed accesses to
//! normalized declarations are rewritten. Type definitions are entered into
//! the table but their bodies are not walked.
//!
//! Errors never stop the walk: each one abandons only the declaration or
//! access it was raised for and is kept as a diagnostic.

use crate::access::{add_expr, flat_bounds, needs_rewrite, rewrite_access};
use crate::config::FlattenConfig;
use crate::dimensions::{collect_dimensions, Collected};
use crate::error::{FlattenError, Result};
use crate::record::expand_path;
use crate::scope::ScopeTable;
use crate::simplify::Simplifier;
use serde::{Deserialize, Serialize};
use vflat_ast::{Ast, NodeId, NodeKind, NodeState};

/// Counters for one or more pass runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    /// Declarations collapsed to one flat range
    pub flattened: usize,
    /// Wires reclassified as memories
    pub memories: usize,
    /// Indexed accesses rewritten to a flat range
    pub rewritten: usize,
    /// Field paths expanded to a flat range
    pub expanded: usize,
    /// Field paths that fell back to a composite symbol name
    pub renamed: usize,
}

impl PassStats {
    pub fn merge(&mut self, other: &PassStats) {
        self.flattened += other.flattened;
        self.memories += other.memories;
        self.rewritten += other.rewritten;
        self.expanded += other.expanded;
        self.renamed += other.renamed;
    }
}

/// The flatten pass over one unit at a time
pub struct FlattenPass<'a> {
    simplifier: &'a dyn Simplifier,
    config: &'a FlattenConfig,
    stats: PassStats,
    errors: Vec<FlattenError>,
}

impl<'a> FlattenPass<'a> {
    pub fn new(simplifier: &'a dyn Simplifier, config: &'a FlattenConfig) -> Self {
        Self {
            simplifier,
            config,
            stats: PassStats::default(),
            errors: Vec::new(),
        }
    }

    /// Walk `unit`, threading `scope` through every declaration
    pub fn run(&mut self, ast: &mut Ast, unit: NodeId, scope: &mut ScopeTable) {
        log::debug!(
            "running {} flatten pass on '{}'",
            self.simplifier.name(),
            ast[unit].name
        );
        self.visit(ast, unit, scope);
    }

    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    pub fn errors(&self) -> &[FlattenError] {
        &self.errors
    }

    /// Consume the pass, returning its counters and diagnostics
    pub fn finish(self) -> (PassStats, Vec<FlattenError>) {
        (self.stats, self.errors)
    }

    fn report(&mut self, err: FlattenError) {
        log::error!("{}", err);
        self.errors.push(err);
    }

    fn visit(&mut self, ast: &mut Ast, id: NodeId, scope: &mut ScopeTable) {
        let kind = ast[id].kind;
        match kind {
            NodeKind::Typedef => {
                scope.insert(ast[id].name.clone(), id);
                if let Some(&body) = ast[id].children.first() {
                    if ast[body].kind == NodeKind::Enum {
                        insert_enum_items(ast, body, scope);
                    }
                }
                return;
            }
            NodeKind::Enum => {
                if !ast[id].name.is_empty() {
                    scope.insert(ast[id].name.clone(), id);
                }
                insert_enum_items(ast, id, scope);
                return;
            }
            NodeKind::Struct | NodeKind::Union => return,
            _ => {}
        }

        let has_dot = kind == NodeKind::Identifier
            && ast[id].children.iter().any(|&c| ast[c].kind == NodeKind::Dot);
        if has_dot {
            if let Err(err) = self.expand_field_access(ast, id, scope) {
                self.report(err);
            }
        }

        for child in ast[id].children.clone() {
            if ast.contains(child) {
                self.visit(ast, child, scope);
            }
        }

        match kind {
            NodeKind::Wire | NodeKind::Memory | NodeKind::Parameter | NodeKind::LocalParam => {
                scope.insert(ast[id].name.clone(), id);
                match collect_dimensions(ast, id, scope, self.simplifier, self.config) {
                    Ok(Collected::Flattened { .. }) => self.stats.flattened += 1,
                    Ok(Collected::Memory) => self.stats.memories += 1,
                    Ok(_) => {}
                    Err(err) => self.report(err),
                }
            }
            NodeKind::Identifier if !has_dot => {
                if let Err(err) = self.rewrite_indexed_access(ast, id, scope) {
                    self.report(err);
                }
            }
            _ => {}
        }
    }

    fn rewrite_indexed_access(
        &mut self,
        ast: &mut Ast,
        id: NodeId,
        scope: &ScopeTable,
    ) -> Result<()> {
        let node = &ast[id];
        if node.is_prepared() || node.children.is_empty() {
            return Ok(());
        }
        let Some(decl) = scope.lookup(&node.name) else {
            return Ok(());
        };
        let rewrite = ast[decl].kind.is_declaration()
            && ast[decl].layout().map_or(false, needs_rewrite);
        if rewrite {
            rewrite_access(ast, id, decl, scope, self.simplifier)?;
            self.stats.rewritten += 1;
        }
        Ok(())
    }

    /// Replace `sym[i]...[k].f.g` by one flat range, or rename it to `sym.f.g`
    fn expand_field_access(
        &mut self,
        ast: &mut Ast,
        id: NodeId,
        scope: &ScopeTable,
    ) -> Result<()> {
        let children = ast[id].children.clone();
        let Some(pos) = children.iter().position(|&c| ast[c].kind == NodeKind::Dot) else {
            return Ok(());
        };
        let dot = children[pos];
        let selectors: Vec<NodeId> = children[..pos]
            .iter()
            .copied()
            .filter(|&c| ast[c].kind == NodeKind::Range)
            .collect();

        let decl = scope.lookup(&ast[id].name);
        let layout = decl.and_then(|d| ast[d].layout().cloned());
        let Some((layout, record)) =
            layout.and_then(|l| l.record.clone().map(|r| (l, r)))
        else {
            if !self.config.dot_fallback {
                return Err(FlattenError::UnknownField {
                    location: ast[id].location(),
                    record: ast[id].name.clone(),
                    field: ast[dot].name.clone(),
                });
            }
            let composite = composite_name(ast, id, dot);
            log::debug!("'{}' has no record type, renamed to '{}'", ast[id].name, composite);
            for old in ast.replace_children(id, Vec::new()) {
                ast.release(old);
            }
            ast[id].name = composite;
            self.stats.renamed += 1;
            return Ok(());
        };

        let (field_high, field_low) = expand_path(ast, &record, dot)?;
        let (elem_high, elem_low) = match flat_bounds(ast, id, &layout, &selectors) {
            Ok(bounds) => bounds,
            Err(err) => {
                ast.release(field_high);
                ast.release(field_low);
                return Err(err);
            }
        };
        ast.release(elem_high);
        let low_copy = ast.deep_clone(elem_low);
        let high = add_expr(ast, low_copy, field_high);
        let low = add_expr(ast, elem_low, field_low);
        let range = ast.range(high, low);
        self.simplifier.fold(ast, range, scope);

        for old in ast.replace_children(id, vec![range]) {
            ast.release(old);
        }
        ast[id].state = NodeState::Prepared;
        self.stats.expanded += 1;
        log::trace!("expanded field access to {}", ast.display(id));
        Ok(())
    }
}

fn insert_enum_items(ast: &Ast, enum_node: NodeId, scope: &mut ScopeTable) {
    for &item in &ast[enum_node].children {
        if ast[item].kind == NodeKind::EnumItem {
            scope.insert(ast[item].name.clone(), item);
        }
    }
}

/// `sym.a.b` from an identifier and the first segment of its field path
fn composite_name(ast: &Ast, id: NodeId, dot: NodeId) -> String {
    let mut name = ast[id].name.clone();
    let mut segment = Some(dot);
    while let Some(seg) = segment {
        name.push('.');
        name.push_str(&ast[seg].name);
        segment = ast[seg]
            .children
            .iter()
            .copied()
            .find(|&c| ast[c].kind == NodeKind::Dot);
    }
    name
}
