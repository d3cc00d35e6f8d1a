//! Arena syntax tree
//!
//! Nodes live in a single arena and refer to each other through [`NodeId`]s.
//! A node exclusively owns the ids listed in its `children`, `packed` and
//! `unpacked` vectors. Ids stay valid until the node is released, which
//! lets symbol tables keep plain ids to declarations while the rest of the
//! tree is rewritten in place.

use crate::layout::DimensionLayout;
use crate::span::{Location, SourceSpan};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Stable address of a node inside an [`Ast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node kinds of the target tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Elaboration units
    Design,
    Module,
    Package,

    // Declarations
    Wire,
    Memory,
    Parameter,
    LocalParam,

    // Type definitions
    Typedef,
    WireType,
    Struct,
    Union,
    StructItem,
    Enum,
    EnumItem,

    // Expressions
    Identifier,
    Constant,
    Range,
    Dot,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    ShiftLeft,
    ShiftRight,
    Neg,
    FCall,
    TCall,

    // Statements the engine only walks through
    Assign,
    AssignEq,
    AssignLe,
    Block,
    Always,
    Initial,
    GenBlock,
    Cell,
    Argument,
}

impl NodeKind {
    /// Storage declarations the flattening engine may normalize
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::Wire | NodeKind::Memory | NodeKind::Parameter | NodeKind::LocalParam
        )
    }

    pub fn is_parameter(self) -> bool {
        matches!(self, NodeKind::Parameter | NodeKind::LocalParam)
    }

    pub fn is_record(self) -> bool {
        matches!(self, NodeKind::Struct | NodeKind::Union)
    }

    pub fn is_binary_op(self) -> bool {
        matches!(
            self,
            NodeKind::Add
                | NodeKind::Sub
                | NodeKind::Mul
                | NodeKind::Div
                | NodeKind::Mod
                | NodeKind::Pow
                | NodeKind::ShiftLeft
                | NodeKind::ShiftRight
        )
    }

    pub fn is_call(self) -> bool {
        matches!(self, NodeKind::FCall | NodeKind::TCall)
    }
}

/// Sized integer constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub value: i64,
    pub width: u32,
    pub signed: bool,
    /// Literal written without an explicit size
    pub is_unsized: bool,
}

impl Constant {
    /// 32-bit signed integer, the type of unsized integer literals
    pub fn int(value: i64) -> Self {
        Self {
            value,
            width: 32,
            signed: true,
            is_unsized: false,
        }
    }
}

/// Literal payload of a `Constant` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(Constant),
    Real(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
    InOut,
}

/// Whether a memory-like declaration must be flattened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenHint {
    /// Decided by the declaration's shape
    #[default]
    Auto,
    /// Used as a whole symbol somewhere; must become a flat vector
    Force,
    /// Must stay a memory (e.g. target of a bulk initialization call)
    Preserve,
}

/// Processing state of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// As produced by the elaborator
    #[default]
    Raw,
    /// Declaration whose dimensions were collapsed to one flat range
    Normalized(Box<DimensionLayout>),
    /// Access whose selectors were replaced by one flat range
    Prepared,
}

/// One tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    /// Symbol name (declarations, identifiers, fields, calls)
    pub name: String,
    pub children: Vec<NodeId>,
    /// Packed dimension ranges, source order (declarations and struct items)
    pub packed: Vec<NodeId>,
    /// Unpacked dimension ranges, source order
    pub unpacked: Vec<NodeId>,
    pub value: Option<Value>,
    pub port: Option<PortDirection>,
    pub hint: FlattenHint,
    pub state: NodeState,
    pub span: Option<SourceSpan>,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            children: Vec::new(),
            packed: Vec::new(),
            unpacked: Vec::new(),
            value: None,
            port: None,
            hint: FlattenHint::Auto,
            state: NodeState::Raw,
            span: None,
        }
    }

    pub fn named(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new(kind)
        }
    }

    pub fn with_children(mut self, children: Vec<NodeId>) -> Self {
        self.children = children;
        self
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn is_port(&self) -> bool {
        self.port.is_some()
    }

    /// Integer payload of a `Constant` node
    pub fn int_value(&self) -> Option<i64> {
        match (&self.kind, &self.value) {
            (NodeKind::Constant, Some(Value::Int(c))) => Some(c.value),
            _ => None,
        }
    }

    /// Layout of a normalized declaration
    pub fn layout(&self) -> Option<&DimensionLayout> {
        match &self.state {
            NodeState::Normalized(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.state, NodeState::Prepared)
    }

    pub fn location(&self) -> Location {
        Location::from(self.span.as_ref())
    }

    /// Every id this node owns
    pub fn owned(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children
            .iter()
            .chain(self.packed.iter())
            .chain(self.unpacked.iter())
            .copied()
    }
}

/// Node arena
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Option<AstNode>>,
    free: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node, reusing a released slot when one is available
    pub fn alloc(&mut self, node: AstNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0 as usize] = Some(node);
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(Some(node));
            id
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AstNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free a node and everything it owns
    pub fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) {
                stack.extend(node.owned());
                self.free.push(id);
            }
        }
    }

    /// Copy a subtree; the copy shares no ids with the original
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let mut node = self[id].clone();
        node.children = node.children.iter().map(|&c| self.deep_clone(c)).collect();
        node.packed = node.packed.iter().map(|&c| self.deep_clone(c)).collect();
        node.unpacked = node.unpacked.iter().map(|&c| self.deep_clone(c)).collect();
        self.alloc(node)
    }

    /// Install `children` and hand back the detached previous children
    ///
    /// The caller owns the returned ids and is expected to release them.
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) -> Vec<NodeId> {
        std::mem::replace(&mut self[id].children, children)
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self[parent].children.push(child);
    }

    /// Pre-order list of `id` and every node below it
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = &self[id];
            let owned: Vec<NodeId> = node.owned().collect();
            stack.extend(owned.into_iter().rev());
        }
        out
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn constant(&mut self, value: i64) -> NodeId {
        let mut node = AstNode::new(NodeKind::Constant);
        node.value = Some(Value::Int(Constant::int(value)));
        self.alloc(node)
    }

    pub fn identifier(&mut self, name: impl Into<String>, selectors: Vec<NodeId>) -> NodeId {
        self.alloc(AstNode::named(NodeKind::Identifier, name).with_children(selectors))
    }

    /// `[left:right]`
    pub fn range(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(AstNode::new(NodeKind::Range).with_children(vec![left, right]))
    }

    /// `[index]`
    pub fn bit_select(&mut self, index: NodeId) -> NodeId {
        self.alloc(AstNode::new(NodeKind::Range).with_children(vec![index]))
    }

    pub fn binary(&mut self, kind: NodeKind, left: NodeId, right: NodeId) -> NodeId {
        debug_assert!(kind.is_binary_op());
        self.alloc(AstNode::new(kind).with_children(vec![left, right]))
    }

    pub fn add(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.binary(NodeKind::Add, left, right)
    }

    pub fn sub(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.binary(NodeKind::Sub, left, right)
    }

    pub fn mul(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.binary(NodeKind::Mul, left, right)
    }

    /// Integer value if `id` is an integer constant
    pub fn const_int(&self, id: NodeId) -> Option<i64> {
        self.get(id).and_then(AstNode::int_value)
    }

    /// Constant bounds of a `Range` node; `[i]` yields `(i, i)`
    pub fn const_bounds(&self, range: NodeId) -> Option<(i64, i64)> {
        let node = self.get(range)?;
        match node.children.as_slice() {
            [index] => self.const_int(*index).map(|i| (i, i)),
            [left, right] => Some((self.const_int(*left)?, self.const_int(*right)?)),
            _ => None,
        }
    }

    /// Turn `id` into an integer constant in place, releasing what it owned
    pub fn set_constant(&mut self, id: NodeId, constant: Constant) {
        let owned: Vec<NodeId> = self[id].owned().collect();
        for child in owned {
            self.release(child);
        }
        let span = self[id].span.take();
        let mut node = AstNode::new(NodeKind::Constant);
        node.value = Some(Value::Int(constant));
        node.span = span;
        self[id] = node;
    }
}

impl Index<NodeId> for Ast {
    type Output = AstNode;

    fn index(&self, id: NodeId) -> &AstNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("INTERNAL ERROR: access to released node {:?}", id),
        }
    }
}

impl IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut AstNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("INTERNAL ERROR: access to released node {:?}", id),
        }
    }
}
