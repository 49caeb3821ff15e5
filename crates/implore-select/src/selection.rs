//! Selection results

use serde::{Deserialize, Serialize};

/// Result of walking a whole structure
///
/// Indices are storage positions, in ascending order. A group or item is listed
/// when at least one leaf beneath it is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub groups: Vec<usize>,
    pub items: Vec<usize>,
    pub leaves: Vec<usize>,
}

impl Selection {
    /// `(groups, items, leaves)` counts
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.groups.len(), self.items.len(), self.leaves.len())
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Append another selection covering later groups
    pub fn extend(&mut self, other: Selection) {
        self.groups.extend(other.groups);
        self.items.extend(other.items);
        self.leaves.extend(other.leaves);
    }
}

/// A resolved bracketed sub-selection, fixed for the evaluator's lifetime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterializedSelection {
    /// Leaf indices in the reference structure
    pub leaves: Vec<usize>,
    /// Positions of those leaves, same order
    pub positions: Vec<[f64; 3]>,
}

impl MaterializedSelection {
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether any position satisfies `accept(squared_distance)`
    ///
    /// Stops at the first match.
    pub fn any_within(&self, point: [f64; 3], accept: impl Fn(f64) -> bool) -> bool {
        self.positions.iter().any(|p| accept(distance_sq(point, *p)))
    }

    /// Whether every position satisfies `accept(squared_distance)`
    ///
    /// Stops at the first violation; vacuously true when empty.
    pub fn all_within(&self, point: [f64; 3], accept: impl Fn(f64) -> bool) -> bool {
        self.positions.iter().all(|p| accept(distance_sq(point, *p)))
    }
}

/// Squared Euclidean distance
pub fn distance_sq(a: [f64; 3], b: [f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}
