//! Dimension collection for declarations
//!
//! Decides whether a declaration must be collapsed to a single flat range
//! and, if so, records the normalized shape of every original dimension on
//! the node. All bounds are folded on copies: a declaration that fails is
//! left exactly as it was.

use crate::config::FlattenConfig;
use crate::error::Result;
use crate::range::{make_range, resolve_dim, size_overflow};
use crate::record::{record_layout, resolve_type_chain, type_child};
use crate::scope::ScopeTable;
use crate::simplify::Simplifier;
use vflat_ast::{
    Ast, DimensionLayout, FlattenHint, NodeId, NodeKind, NodeState, NormalizedDim, RecordLayout,
};

/// What the collector did with a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// Collapsed to `[size-1:0]`
    Flattened { size: i64 },
    /// Reclassified as a memory, dimensions kept
    Memory,
    /// Nothing to do
    Unchanged,
    /// Normalized by an earlier visit
    AlreadyNormalized,
}

/// Dimensions contributed by a declaration's named or inline type
#[derive(Debug, Default)]
struct ResolvedType {
    record: Option<RecordLayout>,
    /// Innermost packed dimensions, source order
    packed: Vec<NodeId>,
    record_width: Option<i64>,
}

impl ResolvedType {
    fn packed_count(&self) -> usize {
        self.packed.len() + usize::from(self.record_width.is_some())
    }
}

fn resolve_type(
    ast: &mut Ast,
    decl: NodeId,
    ty: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<ResolvedType> {
    let chain = resolve_type_chain(ast, decl, ty, scope)?;
    let record = match chain.record {
        Some((body, type_name)) => Some(record_layout(ast, body, &type_name, scope, simplifier)?),
        None => None,
    };
    Ok(ResolvedType {
        record_width: record.as_ref().map(|r| r.width),
        record,
        packed: chain.packed,
    })
}

/// Normalize the dimensions of `decl` if it needs flattening
///
/// # Returns
/// * `Flattened` - the declaration now carries `[size-1:0]` and its layout
/// * `Memory` - a non-port wire with one packed and one unpacked dimension
/// * `Unchanged` / `AlreadyNormalized` - nothing was modified
pub fn collect_dimensions(
    ast: &mut Ast,
    decl: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
    config: &FlattenConfig,
) -> Result<Collected> {
    if ast[decl].layout().is_some() {
        return Ok(Collected::AlreadyNormalized);
    }

    let ty = type_child(ast, decl);
    let resolved = match ty {
        Some(ty) => resolve_type(ast, decl, ty, scope, simplifier)?,
        None => ResolvedType::default(),
    };

    let node = &ast[decl];
    let own_packed = node.packed.clone();
    let own_unpacked = node.unpacked.clone();
    let packed_count = node.packed.len() + resolved.packed_count();
    let unpacked_count = node.unpacked.len();
    if packed_count == 0 && unpacked_count == 0 {
        return Ok(Collected::Unchanged);
    }

    let needs_flatten = packed_count > 1
        || unpacked_count > 1
        || ty.is_some()
        || node.kind.is_parameter()
        || node.is_port()
        || node.hint == FlattenHint::Force;

    if !needs_flatten {
        if node.kind == NodeKind::Wire
            && packed_count == 1
            && unpacked_count == 1
            && config.infer_memories
        {
            log::debug!("'{}' inferred as memory", node.name);
            ast[decl].kind = NodeKind::Memory;
            return Ok(Collected::Memory);
        }
        return Ok(Collected::Unchanged);
    }

    // fold everything before touching the declaration
    let mut packed = Vec::with_capacity(packed_count);
    for range in own_packed.iter().chain(resolved.packed.iter()) {
        packed.push(resolve_dim(ast, decl, *range, scope, simplifier)?);
    }
    if let Some(width) = resolved.record_width {
        packed.push(NormalizedDim {
            min: 0,
            length: width,
            swapped: false,
        });
    }
    let mut unpacked = Vec::with_capacity(unpacked_count);
    for range in &own_unpacked {
        unpacked.push(resolve_dim(ast, decl, *range, scope, simplifier)?);
    }

    packed.reverse();
    unpacked.reverse();
    let layout = DimensionLayout {
        packed,
        unpacked,
        record: resolved.record,
    };
    let size = layout
        .checked_total_size()
        .ok_or_else(|| size_overflow(ast, decl))?;

    for old in own_packed.into_iter().chain(own_unpacked) {
        ast.release(old);
    }
    if let Some(ty) = ty {
        ast[decl].children.retain(|&c| c != ty);
        ast.release(ty);
    }
    let flat = make_range(ast, size - 1, 0);
    let node = &mut ast[decl];
    node.packed = vec![flat];
    node.unpacked.clear();
    node.state = NodeState::Normalized(Box::new(layout));

    log::debug!("flattened '{}' to [{}:0]", node.name, size - 1);
    Ok(Collected::Flattened { size })
}
