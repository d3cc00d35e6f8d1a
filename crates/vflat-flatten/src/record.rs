//! Packed record layout and field path expansion
//!
//! Packed structs place their fields from the most significant bit down in
//! declaration order; unions overlay every field at bit 0. Field positions
//! are always relative to bit 0 of the record that contains them, so a
//! path like `.a.y` is resolved by expanding `.y` inside `a` and then
//! offsetting by where `a` sits in the outer record.

use crate::access::{add_const, add_expr, mul_const};
use crate::error::{FlattenError, Result};
use crate::range::{resolve_width, selector_bounds, size_overflow};
use crate::scope::ScopeTable;
use crate::simplify::Simplifier;
use vflat_ast::{Ast, FieldLayout, FieldShape, NodeId, NodeKind, RecordKind, RecordLayout};

/// Longest typedef chain followed before giving up
const MAX_TYPE_DEPTH: usize = 32;

/// Type reference child of a declaration or struct item
pub(crate) fn type_child(ast: &Ast, owner: NodeId) -> Option<NodeId> {
    ast[owner]
        .children
        .iter()
        .copied()
        .find(|&c| matches!(ast[c].kind, NodeKind::WireType | NodeKind::Struct | NodeKind::Union))
}

/// A type reference reduced to vector dimensions around an optional record
#[derive(Debug, Default)]
pub(crate) struct TypeChain {
    /// Packed ranges contributed by typedef bodies, outermost first
    pub packed: Vec<NodeId>,
    /// Innermost record body and the name it is reported under
    pub record: Option<(NodeId, String)>,
}

/// Follow `ty` through typedefs until it reaches a record or a plain vector
///
/// `typedef byte_t [3:0] word_t` contributes `[3:0]` and then whatever
/// `byte_t` contributes, so the ranges come out outermost first.
pub(crate) fn resolve_type_chain(
    ast: &Ast,
    owner: NodeId,
    ty: NodeId,
    scope: &ScopeTable,
) -> Result<TypeChain> {
    let mut chain = TypeChain::default();
    let mut current = ty;
    for _ in 0..MAX_TYPE_DEPTH {
        let (body, type_name) = if ast[current].kind == NodeKind::WireType {
            let type_name = ast[current].name.clone();
            match scope.lookup_type(ast, &type_name) {
                Some(body) => (body, type_name),
                None => {
                    return Err(FlattenError::UnknownType {
                        location: ast[owner].location(),
                        symbol: ast[owner].name.clone(),
                        type_name,
                    })
                }
            }
        } else {
            (current, ast[owner].name.clone())
        };

        if ast[body].kind.is_record() {
            chain.record = Some((body, type_name));
            return Ok(chain);
        }
        chain.packed.extend(ast[body].packed.iter().copied());
        match type_child(ast, body) {
            Some(next) => current = next,
            None => return Ok(chain),
        }
    }
    Err(FlattenError::RecursiveType {
        location: ast[owner].location(),
        symbol: ast[owner].name.clone(),
        type_name: ast[ty].name.clone(),
        depth: MAX_TYPE_DEPTH,
    })
}

/// Compute the bit layout of a `Struct` or `Union` node
///
/// # Arguments
/// * `record` - the struct or union node
/// * `name` - name reported in diagnostics; the node's own name wins when set
///
/// # Returns
/// The layout, or `UnresolvedConstant` / `UnknownType` / `SizeOverflow` when
/// a field width cannot be determined.
pub fn record_layout(
    ast: &mut Ast,
    record: NodeId,
    name: &str,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<RecordLayout> {
    let kind = match ast[record].kind {
        NodeKind::Union => RecordKind::Union,
        _ => RecordKind::Struct,
    };
    let name = if ast[record].name.is_empty() {
        name.to_string()
    } else {
        ast[record].name.clone()
    };

    // (name, width, shape) in declaration order
    let mut sized = Vec::new();
    for item in ast[record].children.clone() {
        let field = match ast[item].kind {
            NodeKind::StructItem => item_field(ast, item, scope, simplifier)?,
            NodeKind::Struct | NodeKind::Union => {
                let field_name = ast[item].name.clone();
                let inner = record_layout(ast, item, &field_name, scope, simplifier)?;
                let packed = ast[item].packed.clone();
                let count = resolve_width(ast, item, &packed, scope, simplifier)?;
                let width = inner
                    .width
                    .checked_mul(count)
                    .ok_or_else(|| size_overflow(ast, item))?;
                (field_name, width, FieldShape::Record { layout: inner, count })
            }
            _ => continue,
        };
        sized.push(field);
    }

    let width = match kind {
        RecordKind::Struct => sized
            .iter()
            .try_fold(0i64, |total, (_, w, _)| total.checked_add(*w)),
        RecordKind::Union => Some(sized.iter().map(|(_, w, _)| *w).max().unwrap_or(0)),
    }
    .ok_or_else(|| size_overflow(ast, record))?;

    let mut cursor = width;
    let fields = sized
        .into_iter()
        .map(|(name, w, shape)| {
            let (high, low) = match kind {
                RecordKind::Struct => {
                    cursor -= w;
                    (cursor + w - 1, cursor)
                }
                RecordKind::Union => (w - 1, 0),
            };
            FieldLayout {
                name,
                high,
                low,
                shape,
            }
        })
        .collect();

    log::debug!("record '{}' is {} bits wide", name, width);
    Ok(RecordLayout {
        name,
        kind,
        width,
        fields,
    })
}

/// Width and shape of one `StructItem`
fn item_field(
    ast: &mut Ast,
    item: NodeId,
    scope: &ScopeTable,
    simplifier: &dyn Simplifier,
) -> Result<(String, i64, FieldShape)> {
    let name = ast[item].name.clone();
    let ranges: Vec<NodeId> = ast[item]
        .packed
        .iter()
        .chain(ast[item].unpacked.iter())
        .copied()
        .collect();
    let count = resolve_width(ast, item, &ranges, scope, simplifier)?;

    let Some(ty) = type_child(ast, item) else {
        return Ok((name, count, FieldShape::Scalar));
    };
    let chain = resolve_type_chain(ast, item, ty, scope)?;
    let elem = resolve_width(ast, item, &chain.packed, scope, simplifier)?;
    let count = count
        .checked_mul(elem)
        .ok_or_else(|| size_overflow(ast, item))?;

    match chain.record {
        Some((body, type_name)) => {
            let inner = record_layout(ast, body, &type_name, scope, simplifier)?;
            let width = inner
                .width
                .checked_mul(count)
                .ok_or_else(|| size_overflow(ast, item))?;
            Ok((name, width, FieldShape::Record { layout: inner, count }))
        }
        None => Ok((name, count, FieldShape::Scalar)),
    }
}

/// Trailing selector of one path segment, as copied bound expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Index(NodeId),
    Slice(NodeId, NodeId),
}

/// `base + (index + 1) * elem - 1` and `base + index * elem`
fn element_span(ast: &mut Ast, base: i64, hi: NodeId, lo: NodeId, elem: i64) -> (NodeId, NodeId) {
    let next = add_const(ast, hi, 1);
    let scaled = mul_const(ast, next, elem);
    let high = add_const(ast, scaled, base - 1);
    let scaled = mul_const(ast, lo, elem);
    let low = add_const(ast, scaled, base);
    (high, low)
}

/// Expand a field path into `(high, low)` expressions over the bits of `layout`
///
/// `dot` is the outermost `Dot` node of the path. Every segment may carry one
/// `Range` selector and one nested `Dot`. Selector bounds may be symbolic;
/// they are copied into the result, so the path itself is left intact and
/// the caller owns the returned nodes.
pub fn expand_path(ast: &mut Ast, layout: &RecordLayout, dot: NodeId) -> Result<(NodeId, NodeId)> {
    let field_name = ast[dot].name.clone();
    let location = ast[dot].location();
    let Some(field) = layout.field(&field_name) else {
        return Err(FlattenError::UnknownField {
            location,
            record: layout.name.clone(),
            field: field_name,
        });
    };

    let children = ast[dot].children.clone();
    let selectors: Vec<NodeId> = children
        .iter()
        .copied()
        .filter(|&c| ast[c].kind == NodeKind::Range)
        .collect();
    let nested: Vec<NodeId> = children
        .iter()
        .copied()
        .filter(|&c| ast[c].kind == NodeKind::Dot)
        .collect();

    let unsupported = |selector: Option<String>, reason: &str| FlattenError::UnsupportedSelector {
        location: location.clone(),
        field: field_name.clone(),
        selector: selector.unwrap_or_default(),
        reason: reason.to_string(),
    };
    fn text(ast: &Ast, id: NodeId) -> Option<String> {
        Some(ast.display(id).to_string())
    }

    if selectors.len() > 1 {
        return Err(unsupported(text(ast, selectors[1]), "more than one selector"));
    }
    if nested.len() > 1 {
        return Err(unsupported(None, "more than one nested field"));
    }

    let bounds = match selectors.first() {
        None => None,
        Some(&sel) => match selector_bounds(ast, sel) {
            Some(b) => Some((sel, b)),
            None => {
                return Err(unsupported(text(ast, sel), "selector must have one or two bounds"))
            }
        },
    };

    if let Some(&inner_dot) = nested.first() {
        let FieldShape::Record { layout: inner, .. } = &field.shape else {
            return Err(unsupported(None, "nested field on a non-record field"));
        };
        if let Some((sel, (left, right))) = bounds {
            if left != right {
                return Err(unsupported(
                    text(ast, sel),
                    "range selector combined with a nested field",
                ));
            }
        }
        let (high, low) = expand_path(ast, inner, inner_dot)?;
        let (high, low) = match bounds {
            None => (add_const(ast, high, field.low), add_const(ast, low, field.low)),
            Some((_, (index, _))) => {
                // offset of the selected instance: field.low + index * width
                let index = ast.deep_clone(index);
                let scaled = mul_const(ast, index, inner.width);
                let offset = add_const(ast, scaled, field.low);
                let offset_copy = ast.deep_clone(offset);
                (add_expr(ast, high, offset), add_expr(ast, low, offset_copy))
            }
        };
        return Ok((high, low));
    }

    let elem = match &field.shape {
        FieldShape::Scalar => 1,
        FieldShape::Record { layout: inner, .. } => inner.width,
    };
    let selector = bounds.map(|(_, (left, right))| {
        if left == right {
            Selector::Index(left)
        } else {
            Selector::Slice(left, right)
        }
    });
    Ok(match selector {
        None => (ast.constant(field.high), ast.constant(field.low)),
        Some(Selector::Index(i)) => {
            let hi = ast.deep_clone(i);
            let lo = ast.deep_clone(i);
            element_span(ast, field.low, hi, lo, elem)
        }
        Some(Selector::Slice(hi, lo)) => {
            let hi = ast.deep_clone(hi);
            let lo = ast.deep_clone(lo);
            element_span(ast, field.low, hi, lo, elem)
        }
    })
}
