//! Structure access contract
//!
//! The evaluator reads a three-level hierarchy (group, item, leaf) through this
//! trait. Items and leaves are numbered globally; every group owns a contiguous
//! range of items and every item a contiguous range of leaves, in order.

use crate::program::{AttrValue, Level};
use std::ops::Range;

/// Handle to one element of a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Group(usize),
    Item(usize),
    Leaf(usize),
}

impl ElementRef {
    /// Level the handle points into
    pub fn level(&self) -> Level {
        match self {
            ElementRef::Group(_) => Level::Group,
            ElementRef::Item(_) => Level::Item,
            ElementRef::Leaf(_) => Level::Leaf,
        }
    }
}

/// Read-only hierarchical data queried by the evaluator
pub trait Structure {
    /// Number of groups
    fn group_count(&self) -> usize;

    /// Items owned by a group
    fn items_of(&self, group: usize) -> Range<usize>;

    /// Leaves owned by an item
    fn leaves_of(&self, item: usize) -> Range<usize>;

    /// Group owning an item
    fn group_of(&self, item: usize) -> usize;

    /// Item owning a leaf
    fn item_of(&self, leaf: usize) -> usize;

    /// Identity string
    fn name(&self, element: ElementRef) -> &str;

    /// Integer index (serial or sequence number), not the storage position
    fn index(&self, element: ElementRef) -> i64;

    /// Position of a leaf
    fn position(&self, leaf: usize) -> [f64; 3];

    /// Named attribute lookup
    fn attribute(&self, element: ElementRef, key: &str) -> Option<AttrValue>;

    /// Whether the structure knows a named attribute at this level
    ///
    /// Used at evaluator construction to reject programs that reference
    /// attributes the structure can never provide.
    fn declares_attribute(&self, level: Level, key: &str) -> bool;

    /// Total number of leaves
    fn leaf_count(&self) -> usize {
        (0..self.group_count())
            .flat_map(|g| self.items_of(g))
            .map(|i| self.leaves_of(i).len())
            .sum()
    }
}
