//! Design-level driver
//!
//! Runs the memory check and the flatten pass over every unit of a design:
//! packages first, so their constants are normalized before modules import
//! them, then modules. Each unit gets its own scope table.

use crate::config::FlattenConfig;
use crate::error::FlattenError;
use crate::memory::{check_memories, MemoryMarks};
use crate::pass::{FlattenPass, PassStats};
use crate::scope::ScopeTable;
use crate::simplify::{ConstFolder, Simplifier};
use vflat_ast::{Ast, NodeId, NodeKind};

/// Outcome of flattening a whole design
#[derive(Debug, Clone, Default)]
pub struct FlattenReport {
    /// Units processed
    pub units: usize,
    pub stats: PassStats,
    pub memory_marks: MemoryMarks,
    /// Every diagnostic, in the order it was raised
    pub errors: Vec<FlattenError>,
}

impl FlattenReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Flatten `root` with a [`ConstFolder`] built from `config`
pub fn flatten_with_config(ast: &mut Ast, root: NodeId, config: &FlattenConfig) -> FlattenReport {
    let folder = ConstFolder::from_config(config);
    flatten_design(ast, root, &folder, config)
}

/// Flatten every package and module below `root`
///
/// `root` is normally a `Design` node; a single `Module` or `Package` is
/// processed as a one-unit design. A unit with errors never stops the
/// remaining units.
pub fn flatten_design(
    ast: &mut Ast,
    root: NodeId,
    simplifier: &dyn Simplifier,
    config: &FlattenConfig,
) -> FlattenReport {
    let units = match ast[root].kind {
        NodeKind::Module | NodeKind::Package => vec![root],
        _ => ast[root].children.clone(),
    };
    let packages: Vec<NodeId> = units
        .iter()
        .copied()
        .filter(|&u| ast[u].kind == NodeKind::Package)
        .collect();
    let modules: Vec<NodeId> = units
        .iter()
        .copied()
        .filter(|&u| ast[u].kind == NodeKind::Module)
        .collect();

    let mut report = FlattenReport::default();
    for unit in packages.iter().chain(modules.iter()).copied() {
        let mut scope = ScopeTable::enter(unit);
        for &pkg in &packages {
            if pkg != unit {
                scope.import_package(ast, pkg);
            }
        }

        let marks = check_memories(ast, unit, config);
        report.memory_marks.forced += marks.forced;
        report.memory_marks.preserved += marks.preserved;

        let mut pass = FlattenPass::new(simplifier, config);
        pass.run(ast, unit, &mut scope);
        scope.leave();

        let (stats, errors) = pass.finish();
        if !errors.is_empty() {
            log::warn!("unit '{}' finished with {} error(s)", ast[unit].name, errors.len());
        }
        report.stats.merge(&stats);
        report.errors.extend(errors);
        report.units += 1;
    }

    log::info!(
        "flattened {} declarations, rewrote {} accesses, expanded {} field paths in {} units",
        report.stats.flattened,
        report.stats.rewritten,
        report.stats.expanded,
        report.units
    );
    report
}
