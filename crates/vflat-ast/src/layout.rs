//! Normalized dimension and record layout metadata
//!
//! These values are computed by the flattening engine and stored on
//! declaration nodes so that later stages can still recover the original
//! shape of a declaration after its ranges were collapsed.

use serde::{Deserialize, Serialize};

/// One dimension after its bounds were folded to constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDim {
    /// Smaller of the two bounds
    pub min: i64,
    /// Number of elements, `|left - right| + 1`
    pub length: i64,
    /// Declared ascending (`left < right`), e.g. `[0:7]`
    pub swapped: bool,
}

impl NormalizedDim {
    pub fn from_bounds(left: i64, right: i64) -> Self {
        Self {
            min: left.min(right),
            length: i64::try_from(left.abs_diff(right)).map_or(i64::MAX, |d| d.saturating_add(1)),
            swapped: left < right,
        }
    }

    /// Like [`Self::from_bounds`], but `None` when the length does not fit in an `i64`
    pub fn checked_from_bounds(left: i64, right: i64) -> Option<Self> {
        let length = i64::try_from(left.abs_diff(right)).ok()?.checked_add(1)?;
        Some(Self {
            min: left.min(right),
            length,
            swapped: left < right,
        })
    }

    /// Whether indexing this dimension is the identity on the flat range
    pub fn is_identity(&self) -> bool {
        self.min == 0 && !self.swapped
    }
}

/// Normalized shape of a flattened declaration
///
/// Both lists are stored inner-to-outer, the reverse of source order:
/// `logic [1:0][3:0] w [0:2]` stores packed `[[3:0], [1:0]]` and unpacked
/// `[[0:2]]`. Walking `packed` then `unpacked` therefore visits dimensions
/// from the innermost bit outwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionLayout {
    pub packed: Vec<NormalizedDim>,
    pub unpacked: Vec<NormalizedDim>,
    /// Record type of each innermost element, value-copied at normalization
    pub record: Option<RecordLayout>,
}

impl DimensionLayout {
    /// Number of original dimensions
    pub fn len(&self) -> usize {
        self.packed.len() + self.unpacked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensions from the innermost outwards
    pub fn inner_to_outer(&self) -> impl Iterator<Item = &NormalizedDim> {
        self.packed.iter().chain(self.unpacked.iter())
    }

    /// Dimensions in access order, i.e. the order selectors appear in source
    pub fn access_order(&self) -> Vec<NormalizedDim> {
        let mut dims: Vec<NormalizedDim> = self.inner_to_outer().copied().collect();
        dims.reverse();
        dims
    }

    /// Width of the flat range
    ///
    /// Saturates at `i64::MAX`; layouts built by the collector are checked
    /// with [`Self::checked_total_size`] first.
    pub fn total_size(&self) -> i64 {
        self.inner_to_outer()
            .fold(1i64, |size, d| size.saturating_mul(d.length))
    }

    /// Width of the flat range, `None` on overflow
    pub fn checked_total_size(&self) -> Option<i64> {
        self.inner_to_outer()
            .try_fold(1i64, |size, d| size.checked_mul(d.length))
    }

    /// Size of one element of every dimension, in access order
    ///
    /// Entry `i` is the product of the lengths of every dimension inside
    /// access dimension `i`; the innermost dimension has slot size 1.
    pub fn slot_sizes(&self) -> Vec<i64> {
        let mut sizes = Vec::with_capacity(self.len());
        let mut elem_size = 1;
        for dim in self.inner_to_outer() {
            sizes.push(elem_size);
            elem_size = dim.length.saturating_mul(elem_size);
        }
        sizes.reverse();
        sizes
    }

    /// `(minimum, length)` pairs, inner-to-outer
    pub fn min_length_pairs(&self) -> Vec<(i64, i64)> {
        self.inner_to_outer().map(|d| (d.min, d.length)).collect()
    }

    /// Per-dimension swap flags, parallel to [`Self::min_length_pairs`]
    pub fn swap_flags(&self) -> Vec<bool> {
        self.inner_to_outer().map(|d| d.swapped).collect()
    }
}

/// Struct or union
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Struct,
    Union,
}

/// Bit layout of a packed record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub name: String,
    pub kind: RecordKind,
    /// Width of one instance
    pub width: i64,
    /// Fields in declaration order
    pub fields: Vec<FieldLayout>,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Position of one field, relative to the enclosing record's bit 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub high: i64,
    pub low: i64,
    pub shape: FieldShape,
}

impl FieldLayout {
    pub fn width(&self) -> i64 {
        self.high - self.low + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldShape {
    /// Plain bit vector
    Scalar,
    /// Nested record, `count` instances laid out back to back
    Record { layout: RecordLayout, count: i64 },
}
