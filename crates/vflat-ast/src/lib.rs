//! vflat AST - the syntax tree handed to the synthesis front end
//!
//! This crate provides:
//! - An arena tree addressed by stable node ids
//! - Normalized dimension and record layout metadata carried by nodes
//! - Decoding of elaboration-model constants
//! - An expression printer for diagnostics

pub mod ast;
pub mod display;
pub mod layout;
pub mod literal;
pub mod span;

pub use ast::{
    Ast, AstNode, Constant, FlattenHint, NodeId, NodeKind, NodeState, PortDirection, Value,
};
pub use layout::{DimensionLayout, FieldLayout, FieldShape, NormalizedDim, RecordKind, RecordLayout};
pub use literal::{Literal, LiteralError};
pub use span::{Location, SourceSpan};
