//! Expression printer used in diagnostics

use crate::ast::{Ast, NodeId, NodeKind, Value};
use std::fmt;

/// Displays the subtree rooted at a node in HDL-like syntax
pub struct DisplayNode<'a> {
    ast: &'a Ast,
    id: NodeId,
}

impl Ast {
    /// `format!("{}", ast.display(id))` renders the expression at `id`
    pub fn display(&self, id: NodeId) -> DisplayNode<'_> {
        DisplayNode { ast: self, id }
    }
}

fn binary_symbol(kind: NodeKind) -> Option<&'static str> {
    Some(match kind {
        NodeKind::Add => "+",
        NodeKind::Sub => "-",
        NodeKind::Mul => "*",
        NodeKind::Div => "/",
        NodeKind::Mod => "%",
        NodeKind::Pow => "**",
        NodeKind::ShiftLeft => "<<",
        NodeKind::ShiftRight => ">>",
        _ => return None,
    })
}

impl fmt::Display for DisplayNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(node) = self.ast.get(self.id) else {
            return write!(f, "<released>");
        };
        let child = |id: NodeId| self.ast.display(id);

        match node.kind {
            NodeKind::Constant => match &node.value {
                Some(Value::Int(c)) => write!(f, "{}", c.value),
                Some(Value::Real(r)) => write!(f, "{}", r),
                Some(Value::Str(s)) => write!(f, "\"{}\"", s),
                None => write!(f, "?"),
            },
            NodeKind::Identifier => {
                write!(f, "{}", node.name)?;
                for &c in &node.children {
                    write!(f, "{}", child(c))?;
                }
                Ok(())
            }
            NodeKind::Range => match node.children.as_slice() {
                [index] => write!(f, "[{}]", child(*index)),
                [left, right] => write!(f, "[{}:{}]", child(*left), child(*right)),
                _ => write!(f, "[]"),
            },
            NodeKind::Dot => {
                write!(f, ".{}", node.name)?;
                for &c in &node.children {
                    write!(f, "{}", child(c))?;
                }
                Ok(())
            }
            NodeKind::Neg => match node.children.first() {
                Some(&operand) => write!(f, "-{}", child(operand)),
                None => write!(f, "-?"),
            },
            NodeKind::FCall | NodeKind::TCall => {
                write!(f, "{}(", node.name)?;
                for (i, &arg) in node.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child(arg))?;
                }
                write!(f, ")")
            }
            kind => match (binary_symbol(kind), node.children.as_slice()) {
                (Some(op), [left, right]) => {
                    write!(f, "({} {} {})", child(*left), op, child(*right))
                }
                _ if !node.name.is_empty() => write!(f, "{}", node.name),
                _ => write!(f, "<{:?}>", kind),
            },
        }
    }
}
