//! Range builder and bound folding

use crate::error::{FlattenError, Result};
use crate::scope::ScopeTable;
use crate::simplify::Simplifier;
use vflat_ast::{Ast, AstNode, NodeId, NodeKind, NormalizedDim};

/// Build a pre-validated `[left:right]` range with constant bounds
pub fn make_range(ast: &mut Ast, left: i64, right: i64) -> NodeId {
    let l = ast.constant(left);
    let r = ast.constant(right);
    ast.alloc(AstNode::new(NodeKind::Range).with_children(vec![l, r]))
}

/// Bounds of a range selector as `(left, right)` ids; `[i]` yields `(i, i)`
///
/// Returns `None` for ranges with no or more than two bounds.
pub fn selector_bounds(ast: &Ast, range: NodeId) -> Option<(NodeId, NodeId)> {
    match ast[range].children.as_slice() {
        [index] => Some((*index, *index)),
        [left, right] => Some((*left, *right)),
        _ => None,
    }
}

/// Fold the bounds of `range` on a copy, leaving the range itself untouched
pub fn fold_bounds(
    ast: &mut Ast,
    range: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Option<(i64, i64)> {
    let copy = ast.deep_clone(range);
    simplifier.fold(ast, copy, scope);
    let bounds = ast.const_bounds(copy);
    ast.release(copy);
    bounds
}

/// Fold a dimension of `owner`, reporting `UnresolvedConstant` against it
pub fn resolve_dim(
    ast: &mut Ast,
    owner: NodeId,
    range: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<NormalizedDim> {
    match fold_bounds(ast, range, scope, simplifier) {
        Some((left, right)) => {
            NormalizedDim::checked_from_bounds(left, right).ok_or_else(|| size_overflow(ast, owner))
        }
        None => {
            let location = match ast[range].span {
                Some(_) => ast[range].location(),
                None => ast[owner].location(),
            };
            Err(FlattenError::UnresolvedConstant {
                location,
                symbol: ast[owner].name.clone(),
                expr: ast.display(range).to_string(),
            })
        }
    }
}

/// Product of the lengths of `ranges`; 1 when there are none
pub fn resolve_width(
    ast: &mut Ast,
    owner: NodeId,
    ranges: &[NodeId],
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<i64> {
    let mut width: i64 = 1;
    for &range in ranges {
        let length = resolve_dim(ast, owner, range, scope, simplifier)?.length;
        width = width
            .checked_mul(length)
            .ok_or_else(|| size_overflow(ast, owner))?;
    }
    Ok(width)
}

pub(crate) fn size_overflow(ast: &Ast, owner: NodeId) -> FlattenError {
    FlattenError::SizeOverflow {
        location: ast[owner].location(),
        symbol: ast[owner].name.clone(),
    }
}
