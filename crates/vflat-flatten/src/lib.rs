//! vflat flatten - dimension flattening and symbolic address resolution
//!
//! This crate handles:
//! - Collapsing multi-dimensional packed/unpacked declarations to one flat range
//! - Rewriting indexed accesses into offset arithmetic over that range
//! - Expanding record field paths into flat bit ranges
//! - Threading a per-unit scope table through the whole pass

pub mod access;
pub mod config;
pub mod design;
pub mod dimensions;
pub mod error;
pub mod memory;
pub mod pass;
pub mod range;
pub mod record;
pub mod scope;
pub mod simplify;

pub use access::{flat_bounds, needs_rewrite, rewrite_access};
pub use config::FlattenConfig;
pub use design::{flatten_design, flatten_with_config, FlattenReport};
pub use dimensions::{collect_dimensions, Collected};
pub use error::{ConfigError, FlattenError, Result};
pub use memory::{check_memories, MemoryMarks};
pub use pass::{FlattenPass, PassStats};
pub use range::make_range;
pub use record::{expand_path, record_layout};
pub use scope::ScopeTable;
pub use simplify::{ConstFolder, Simplifier};
