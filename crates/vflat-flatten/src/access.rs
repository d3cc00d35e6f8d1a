//! Access rewriting against flattened declarations
//!
//! An access `w[a][b][c]` to a declaration that was collapsed to one flat
//! range is rewritten to a single `[high:low]` selector over that range.
//! Indices may be arbitrary expressions; the rewriter builds the offset
//! arithmetic as a tree and leaves it to the simplifier to fold whatever is
//! constant.

use crate::error::{FlattenError, Result};
use crate::range::selector_bounds;
use crate::scope::ScopeTable;
use crate::simplify::Simplifier;
use vflat_ast::{Ast, DimensionLayout, NodeId, NodeKind, NodeState, NormalizedDim};

/// Whether accesses to a declaration with `layout` must be rewritten
///
/// A single descending zero-based dimension already matches the flat range.
pub fn needs_rewrite(layout: &DimensionLayout) -> bool {
    match layout.len() {
        0 => false,
        1 => !layout.inner_to_outer().all(NormalizedDim::is_identity),
        _ => true,
    }
}

pub(crate) fn add_const(ast: &mut Ast, expr: NodeId, k: i64) -> NodeId {
    match k {
        0 => expr,
        k if k < 0 => {
            let k = ast.constant(-k);
            ast.sub(expr, k)
        }
        k => {
            let k = ast.constant(k);
            ast.add(expr, k)
        }
    }
}

pub(crate) fn mul_const(ast: &mut Ast, expr: NodeId, k: i64) -> NodeId {
    if k == 1 {
        return expr;
    }
    let k = ast.constant(k);
    ast.mul(expr, k)
}

/// `left + right`, skipping the addition when either side is a constant
pub(crate) fn add_expr(ast: &mut Ast, left: NodeId, right: NodeId) -> NodeId {
    if let Some(k) = ast.const_int(right) {
        ast.release(right);
        return add_const(ast, left, k);
    }
    if let Some(k) = ast.const_int(left) {
        ast.release(left);
        return add_const(ast, right, k);
    }
    ast.add(left, right)
}

/// Zero-based position of index `x` in `dim`, counting from the low bit
fn position(ast: &mut Ast, x: NodeId, dim: &NormalizedDim) -> NodeId {
    let rel = if dim.min == 0 {
        x
    } else {
        let min = ast.constant(dim.min);
        ast.sub(x, min)
    };
    if dim.swapped {
        let top = ast.constant(dim.length - 1);
        ast.sub(top, rel)
    } else {
        rel
    }
}

/// Build `(high, low)` expressions for `access` with `selectors`
///
/// `selectors` are `Range` nodes in source order, one per leading dimension;
/// their bounds are copied, the selectors themselves are not modified.
/// Omitted trailing dimensions select whole slots.
pub fn flat_bounds(
    ast: &mut Ast,
    access: NodeId,
    layout: &DimensionLayout,
    selectors: &[NodeId],
) -> Result<(NodeId, NodeId)> {
    let dims = layout.access_order();
    if selectors.len() > dims.len() {
        return Err(FlattenError::InvalidDimensionCount {
            location: ast[access].location(),
            symbol: ast[access].name.clone(),
            supplied: selectors.len(),
            declared: dims.len(),
        });
    }
    let mut bounds = Vec::with_capacity(selectors.len());
    for &sel in selectors {
        match selector_bounds(ast, sel) {
            Some(b) => bounds.push(b),
            None => {
                return Err(FlattenError::UnsupportedSelector {
                    location: ast[access].location(),
                    field: ast[access].name.clone(),
                    selector: ast.display(sel).to_string(),
                    reason: "selector must have one or two bounds".to_string(),
                })
            }
        }
    }

    let Some((&(left, right), outer)) = bounds.split_last() else {
        let high = ast.constant(layout.total_size() - 1);
        let low = ast.constant(0);
        return Ok((high, low));
    };
    let slots = layout.slot_sizes();

    let last = outer.len();
    let (mut high, mut low) = {
        let dim = &dims[last];
        let left = ast.deep_clone(left);
        let right = ast.deep_clone(right);
        let p_left = position(ast, left, dim);
        let next = add_const(ast, p_left, 1);
        let scaled = mul_const(ast, next, slots[last]);
        let p_right = position(ast, right, dim);
        (add_const(ast, scaled, -1), mul_const(ast, p_right, slots[last]))
    };

    for (i, &(_, right)) in outer.iter().enumerate().rev() {
        let right = ast.deep_clone(right);
        let p_right = position(ast, right, &dims[i]);
        let base_low = mul_const(ast, p_right, slots[i]);

        // keep the inner width, move its offset into this slot
        let low_copy = ast.deep_clone(low);
        let width = ast.sub(high, low_copy);
        low = ast.add(base_low, low);
        let low_copy = ast.deep_clone(low);
        high = ast.add(low_copy, width);
    }

    Ok((high, low))
}

/// Rewrite the selectors of `access` to one flat range over `decl`
///
/// Leading `Range` children are consumed; any other children are left in
/// place after the new range. The new range is folded with `simplifier` and
/// the access is marked prepared.
pub fn rewrite_access(
    ast: &mut Ast,
    access: NodeId,
    decl: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<()> {
    let Some(layout) = ast[decl].layout().cloned() else {
        return Ok(());
    };
    let children = ast[access].children.clone();
    let split = children
        .iter()
        .position(|&c| ast[c].kind != NodeKind::Range)
        .unwrap_or(children.len());
    let (selectors, rest) = children.split_at(split);

    let (high, low) = flat_bounds(ast, access, &layout, selectors)?;
    let range = ast.range(high, low);
    simplifier.fold(ast, range, scope);

    let mut new_children = vec![range];
    new_children.extend_from_slice(rest);
    for old in ast.replace_children(access, new_children) {
        if !rest.contains(&old) {
            ast.release(old);
        }
    }
    ast[access].state = NodeState::Prepared;

    log::trace!(
        "rewrote access to '{}' as {}",
        ast[access].name,
        ast.display(range)
    );
    Ok(())
}
