//! Memory usage checks
//!
//! A wire with exactly one packed and one unpacked dimension is normally kept
//! as a memory. When such a wire is used as a whole symbol, the memory cannot
//! be kept and the wire is marked for flattening. Targets of bulk
//! initialization calls must stay memories.

use crate::config::FlattenConfig;
use indexmap::IndexMap;
use vflat_ast::{Ast, FlattenHint, NodeId, NodeKind};

/// Number of hints set on one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryMarks {
    pub forced: usize,
    pub preserved: usize,
}

/// Name of the symbol passed as argument `index` of a call
fn call_argument(ast: &Ast, call: NodeId, index: usize) -> Option<&str> {
    let mut arg = *ast[call].children.get(index)?;
    if ast[arg].kind == NodeKind::Argument {
        arg = *ast[arg].children.first()?;
    }
    let node = &ast[arg];
    (node.kind == NodeKind::Identifier).then_some(node.name.as_str())
}

/// Set flatten hints on the memory candidates of `unit`
///
/// Walks the unit in pre-order, so a memory is only considered from its
/// declaration onwards.
pub fn check_memories(ast: &mut Ast, unit: NodeId, config: &FlattenConfig) -> MemoryMarks {
    let mut candidates: IndexMap<String, NodeId> = IndexMap::new();
    let mut marks = MemoryMarks::default();

    for id in ast.descendants(unit) {
        let node = &ast[id];
        let kind = node.kind;
        match kind {
            NodeKind::Wire if node.packed.len() == 1 && node.unpacked.len() == 1 => {
                candidates.insert(node.name.clone(), id);
            }
            _ if kind.is_call() && config.is_memory_init_call(&node.name) => {
                let target = call_argument(ast, id, 1).and_then(|name| candidates.get(name));
                if let Some(&mem) = target {
                    if ast[mem].hint != FlattenHint::Preserve {
                        log::debug!("'{}' initialized by {}, kept as memory", ast[mem].name, ast[id].name);
                        ast[mem].hint = FlattenHint::Preserve;
                        marks.preserved += 1;
                    }
                }
            }
            NodeKind::Identifier if node.children.is_empty() => {
                if let Some(&mem) = candidates.get(&node.name) {
                    if ast[mem].hint == FlattenHint::Auto {
                        log::debug!("'{}' used as a whole, forcing flatten", ast[mem].name);
                        ast[mem].hint = FlattenHint::Force;
                        marks.forced += 1;
                    }
                }
            }
            _ => {}
        }
    }
    marks
}
