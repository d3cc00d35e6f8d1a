//! Error types for flattening

use thiserror::Error;
use vflat_ast::Location;

/// Result type for flattening operations
pub type Result<T> = std::result::Result<T, FlattenError>;

/// Errors raised while flattening one declaration or rewriting one access
///
/// Each error aborts only the declaration or access it was raised for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlattenError {
    /// A dimension or selector bound could not be folded to an integer
    #[error("{location}: could not resolve '{expr}' to a constant in '{symbol}'")]
    UnresolvedConstant {
        location: Location,
        symbol: String,
        expr: String,
    },

    /// A dotted path names a field the record does not have
    #[error("{location}: couldn't find field '{field}' in record '{record}'")]
    UnknownField {
        location: Location,
        record: String,
        field: String,
    },

    /// A selector shape the expander does not model
    #[error("{location}: unsupported selector '{selector}' on field '{field}': {reason}")]
    UnsupportedSelector {
        location: Location,
        field: String,
        selector: String,
        reason: String,
    },

    /// More selectors than the declaration has dimensions
    #[error(
        "{location}: '{symbol}' is accessed with {supplied} selectors but declares {declared} dimensions"
    )]
    InvalidDimensionCount {
        location: Location,
        symbol: String,
        supplied: usize,
        declared: usize,
    },

    /// A named type reference that is not in scope
    #[error("{location}: unknown type '{type_name}' for '{symbol}'")]
    UnknownType {
        location: Location,
        symbol: String,
        type_name: String,
    },

    /// A chain of typedefs that never reaches a concrete type
    #[error("{location}: type '{type_name}' of '{symbol}' does not resolve within {depth} typedefs")]
    RecursiveType {
        location: Location,
        symbol: String,
        type_name: String,
        depth: usize,
    },

    /// A dimension or record is wider than a 64-bit offset can address
    #[error("{location}: size of '{symbol}' overflows 64 bits")]
    SizeOverflow { location: Location, symbol: String },
}

impl FlattenError {
    pub fn location(&self) -> &Location {
        match self {
            FlattenError::UnresolvedConstant { location, .. }
            | FlattenError::UnknownField { location, .. }
            | FlattenError::UnsupportedSelector { location, .. }
            | FlattenError::InvalidDimensionCount { location, .. }
            | FlattenError::UnknownType { location, .. }
            | FlattenError::RecursiveType { location, .. }
            | FlattenError::SizeOverflow { location, .. } => location,
        }
    }
}

/// Errors loading a [`crate::FlattenConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file
    #[error("I/O error: {0}")]
    Io(String),

    /// TOML parsing error
    #[error("Failed to parse flatten configuration: {0}")]
    Parse(String),
}
