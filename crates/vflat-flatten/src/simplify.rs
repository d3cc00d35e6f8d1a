//! Simplifier interface and the built-in constant folder
//!
//! The flattening engine only needs one service from the downstream tree
//! simplifier: reduce an expression to integer constants where possible.
//! [`ConstFolder`] implements that over integer arithmetic, `$clog2`, and
//! references to parameters, localparams and enum items in scope.

use crate::config::FlattenConfig;
use crate::scope::ScopeTable;
use vflat_ast::{Ast, Constant, NodeId, NodeKind};

/// Folds expressions in place
pub trait Simplifier {
    /// Fold the subtree rooted at `id` in place
    ///
    /// Returns `true` when the node is now an integer constant, or a range
    /// whose bounds are all integer constants. Calling it again on an
    /// already folded node changes nothing.
    fn fold(&self, ast: &mut Ast, id: NodeId, scope: &ScopeTable) -> bool;

    /// Get the name of this simplifier
    fn name(&self) -> &str;
}

/// Integer constant folding
#[derive(Debug, Clone)]
pub struct ConstFolder {
    /// Limit on parameter-to-parameter reference chains
    max_depth: usize,
}

impl ConstFolder {
    pub fn new() -> Self {
        Self { max_depth: 64 }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &FlattenConfig) -> Self {
        Self::with_max_depth(config.max_fold_depth)
    }

    /// Evaluate an expression without modifying the tree
    pub fn evaluate(&self, ast: &Ast, id: NodeId, scope: &ScopeTable) -> Option<i64> {
        self.eval(ast, id, scope, 0)
    }

    fn eval(&self, ast: &Ast, id: NodeId, scope: &ScopeTable, depth: usize) -> Option<i64> {
        let node = ast.get(id)?;
        match node.kind {
            NodeKind::Constant => node.int_value(),
            NodeKind::Identifier if node.children.is_empty() => {
                self.eval_symbol(ast, &node.name, scope, depth)
            }
            NodeKind::Neg => {
                let [operand] = node.children.as_slice() else {
                    return None;
                };
                self.eval(ast, *operand, scope, depth)?.checked_neg()
            }
            kind if kind.is_binary_op() => {
                let [left, right] = node.children.as_slice() else {
                    return None;
                };
                let l = self.eval(ast, *left, scope, depth)?;
                let r = self.eval(ast, *right, scope, depth)?;
                fold_binary(kind, l, r)
            }
            NodeKind::FCall if node.name == "$clog2" => {
                let [arg] = node.children.as_slice() else {
                    return None;
                };
                clog2(self.eval(ast, *arg, scope, depth)?)
            }
            _ => None,
        }
    }

    fn eval_symbol(&self, ast: &Ast, name: &str, scope: &ScopeTable, depth: usize) -> Option<i64> {
        if depth >= self.max_depth {
            log::warn!("constant folding of '{}' exceeded depth {}", name, self.max_depth);
            return None;
        }
        let decl = scope.lookup(name)?;
        let node = ast.get(decl)?;
        match node.kind {
            NodeKind::Parameter | NodeKind::LocalParam | NodeKind::EnumItem => {
                let value = *node.children.first()?;
                self.eval(ast, value, scope, depth + 1)
            }
            _ => None,
        }
    }

    /// Fold what can be folded below a node that is not constant as a whole
    fn fold_children(&self, ast: &mut Ast, id: NodeId, scope: &ScopeTable) {
        let children = ast[id].children.clone();
        for child in children {
            self.fold(ast, child, scope);
        }
    }
}

impl Default for ConstFolder {
    fn default() -> Self {
        Self::new()
    }
}

impl Simplifier for ConstFolder {
    fn fold(&self, ast: &mut Ast, id: NodeId, scope: &ScopeTable) -> bool {
        match ast[id].kind {
            NodeKind::Constant => ast[id].int_value().is_some(),
            NodeKind::Range => {
                let bounds = ast[id].children.clone();
                let mut folded = !bounds.is_empty() && bounds.len() <= 2;
                for bound in bounds {
                    folded &= self.fold(ast, bound, scope);
                }
                folded
            }
            _ => match self.evaluate(ast, id, scope) {
                Some(value) => {
                    ast.set_constant(id, Constant::int(value));
                    true
                }
                None => {
                    self.fold_children(ast, id, scope);
                    false
                }
            },
        }
    }

    fn name(&self) -> &str {
        "Constant Folding"
    }
}

fn fold_binary(op: NodeKind, l: i64, r: i64) -> Option<i64> {
    match op {
        NodeKind::Add => l.checked_add(r),
        NodeKind::Sub => l.checked_sub(r),
        NodeKind::Mul => l.checked_mul(r),
        NodeKind::Div if r != 0 => l.checked_div(r),
        NodeKind::Mod if r != 0 => l.checked_rem(r),
        NodeKind::Pow => l.checked_pow(u32::try_from(r).ok()?),
        NodeKind::ShiftLeft => l.checked_shl(u32::try_from(r).ok()?),
        NodeKind::ShiftRight => l.checked_shr(u32::try_from(r).ok()?),
        _ => None,
    }
}

/// Ceiling log2; `$clog2(0)` and `$clog2(1)` are 0
fn clog2(value: i64) -> Option<i64> {
    if value < 0 {
        return None;
    }
    if value <= 1 {
        return Some(0);
    }
    Some(64 - i64::from((value - 1).leading_zeros()))
}
