//! Group fields: named node and element membership.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ElementId, MAX_DIMENSION, NodeId};

/// How adding an element to a group treats the element's boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SubelementHandling {
    /// Only the element itself is added.
    #[default]
    None,
    /// The element's faces, lines and nodes are added with it.
    Full,
}

/// Membership sets of a group field.
///
/// Element sets are kept per mesh dimension.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupField {
    nodes: BTreeSet<NodeId>,
    elements: [BTreeSet<ElementId>; MAX_DIMENSION],
    subelement_handling: SubelementHandling,
}

impl GroupField {
    /// Subelement handling mode.
    #[must_use]
    pub fn subelement_handling(&self) -> SubelementHandling {
        self.subelement_handling
    }

    /// Sets the subelement handling mode.
    pub fn set_subelement_handling(&mut self, mode: SubelementHandling) {
        self.subelement_handling = mode;
    }

    /// Member nodes in ascending identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Member elements of the mesh with `dimension`, ascending.
    ///
    /// Dimensions outside 1..=3 yield nothing.
    pub fn elements(&self, dimension: usize) -> impl Iterator<Item = ElementId> + '_ {
        dimension
            .checked_sub(1)
            .and_then(|i| self.elements.get(i))
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of member nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of member elements in the mesh with `dimension`.
    #[must_use]
    pub fn element_count(&self, dimension: usize) -> usize {
        dimension
            .checked_sub(1)
            .and_then(|i| self.elements.get(i))
            .map_or(0, BTreeSet::len)
    }

    /// Returns true if `node` is a member.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Returns true if the element of the given dimension is a member.
    #[must_use]
    pub fn contains_element(&self, dimension: usize, element: ElementId) -> bool {
        dimension
            .checked_sub(1)
            .and_then(|i| self.elements.get(i))
            .is_some_and(|set| set.contains(&element))
    }

    /// Returns true if the group has no members at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.iter().all(BTreeSet::is_empty)
    }

    /// Adds a node.
    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.insert(node);
    }

    /// Adds an element of the given dimension. Dimensions outside 1..=3 are ignored.
    pub fn add_element(&mut self, dimension: usize, element: ElementId) {
        if let Some(set) = dimension
            .checked_sub(1)
            .and_then(|i| self.elements.get_mut(i))
        {
            set.insert(element);
        }
    }

    /// Removes every member, keeping the handling mode.
    pub fn clear(&mut self) {
        self.nodes.clear();
        for set in &mut self.elements {
            set.clear();
        }
    }

    /// Adds every member of `other`.
    pub fn union_with(&mut self, other: &Self) {
        self.nodes.extend(other.nodes.iter().copied());
        for (mine, theirs) in self.elements.iter_mut().zip(other.elements.iter()) {
            mine.extend(theirs.iter().copied());
        }
    }
}
