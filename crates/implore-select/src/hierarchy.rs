//! In-memory hierarchy store
//!
//! A flat, serializable implementation of [`Structure`]: groups, items and
//! leaves live in three vectors, each parent holding the range of its children.

use crate::program::{AttrValue, Level};
use crate::structure::{ElementRef, Structure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// A group or item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Node {
    name: String,
    index: i64,
    attributes: BTreeMap<String, AttrValue>,
    /// Child range in the next level's vector
    children: Range<usize>,
    /// Parent position in the previous level's vector (unused for groups)
    parent: usize,
}

/// A leaf with a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LeafNode {
    name: String,
    index: i64,
    position: [f64; 3],
    attributes: BTreeMap<String, AttrValue>,
    parent: usize,
}

/// Flat three-level hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    groups: Vec<Node>,
    items: Vec<Node>,
    leaves: Vec<LeafNode>,
    /// Attribute keys known per level, indexed by `Level::index`
    declared: [BTreeSet<String>; 3],
}

impl Hierarchy {
    /// Start building a hierarchy
    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::default()
    }

    /// Load a hierarchy previously written with `to_json`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn attributes(&self, element: ElementRef) -> &BTreeMap<String, AttrValue> {
        match element {
            ElementRef::Group(g) => &self.groups[g].attributes,
            ElementRef::Item(i) => &self.items[i].attributes,
            ElementRef::Leaf(l) => &self.leaves[l].attributes,
        }
    }
}

impl Structure for Hierarchy {
    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn items_of(&self, group: usize) -> Range<usize> {
        self.groups[group].children.clone()
    }

    fn leaves_of(&self, item: usize) -> Range<usize> {
        self.items[item].children.clone()
    }

    fn group_of(&self, item: usize) -> usize {
        self.items[item].parent
    }

    fn item_of(&self, leaf: usize) -> usize {
        self.leaves[leaf].parent
    }

    fn name(&self, element: ElementRef) -> &str {
        match element {
            ElementRef::Group(g) => &self.groups[g].name,
            ElementRef::Item(i) => &self.items[i].name,
            ElementRef::Leaf(l) => &self.leaves[l].name,
        }
    }

    fn index(&self, element: ElementRef) -> i64 {
        match element {
            ElementRef::Group(g) => self.groups[g].index,
            ElementRef::Item(i) => self.items[i].index,
            ElementRef::Leaf(l) => self.leaves[l].index,
        }
    }

    fn position(&self, leaf: usize) -> [f64; 3] {
        self.leaves[leaf].position
    }

    fn attribute(&self, element: ElementRef, key: &str) -> Option<AttrValue> {
        self.attributes(element).get(key).cloned()
    }

    fn declares_attribute(&self, level: Level, key: &str) -> bool {
        self.declared[level.index()].contains(key)
    }

    fn leaf_count(&self) -> usize {
        self.leaves.len()
    }
}

/// Sequential builder: each item joins the last group, each leaf the last item
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    hierarchy: Hierarchy,
    last: Option<Level>,
}

impl HierarchyBuilder {
    /// Append a group
    pub fn group(mut self, name: impl Into<String>) -> Self {
        let index = self.hierarchy.groups.len() as i64;
        let start = self.hierarchy.items.len();
        self.hierarchy.groups.push(Node {
            name: name.into(),
            index,
            attributes: BTreeMap::new(),
            children: start..start,
            parent: 0,
        });
        self.last = Some(Level::Group);
        self
    }

    /// Append an item to the current group
    pub fn item(mut self, name: impl Into<String>, index: i64) -> Self {
        if self.hierarchy.groups.is_empty() {
            self = self.group("");
        }
        let parent = self.hierarchy.groups.len() - 1;
        let start = self.hierarchy.leaves.len();
        self.hierarchy.items.push(Node {
            name: name.into(),
            index,
            attributes: BTreeMap::new(),
            children: start..start,
            parent,
        });
        self.hierarchy.groups[parent].children.end = self.hierarchy.items.len();
        self.last = Some(Level::Item);
        self
    }

    /// Append a leaf to the current item
    pub fn leaf(mut self, name: impl Into<String>, index: i64, position: [f64; 3]) -> Self {
        if self.hierarchy.items.is_empty() {
            self = self.item("", 0);
        }
        let parent = self.hierarchy.items.len() - 1;
        self.hierarchy.leaves.push(LeafNode {
            name: name.into(),
            index,
            position,
            attributes: BTreeMap::new(),
            parent,
        });
        self.hierarchy.items[parent].children.end = self.hierarchy.leaves.len();
        self.last = Some(Level::Leaf);
        self
    }

    /// Set a named attribute on the most recently added element
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let key = key.into();
        let value = value.into();
        let h = &mut self.hierarchy;
        let slot = match self.last {
            Some(Level::Group) => h.groups.last_mut().map(|n| &mut n.attributes),
            Some(Level::Item) => h.items.last_mut().map(|n| &mut n.attributes),
            Some(Level::Leaf) => h.leaves.last_mut().map(|n| &mut n.attributes),
            None => None,
        };
        if let (Some(attributes), Some(level)) = (slot, self.last) {
            h.declared[level.index()].insert(key.clone());
            attributes.insert(key, value);
        }
        self
    }

    /// Declare an attribute key at a level without setting it on any element
    pub fn declare(mut self, level: Level, key: impl Into<String>) -> Self {
        self.hierarchy.declared[level.index()].insert(key.into());
        self
    }

    pub fn build(self) -> Hierarchy {
        self.hierarchy
    }
}
