//! Evaluation locations.

use std::fmt;

use crate::{ElementId, NodeId};

/// Where a field is evaluated: at a node, or inside an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// At a node.
    Node(NodeId),
    /// Inside an element of the mesh with the given dimension.
    Element {
        /// Dimension of the mesh holding the element.
        dimension: usize,
        /// Element identifier.
        element: ElementId,
        /// Local coordinates; components beyond `dimension` are ignored.
        xi: [f64; 3],
    },
}

impl Location {
    /// Creates a node location.
    #[must_use]
    pub const fn node(id: NodeId) -> Self {
        Self::Node(id)
    }

    /// Creates an element location.
    #[must_use]
    pub const fn element(dimension: usize, element: ElementId, xi: [f64; 3]) -> Self {
        Self::Element {
            dimension,
            element,
            xi,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Element {
                dimension,
                element,
                xi,
            } => write!(f, "{dimension}D element {element} xi {xi:?}"),
        }
    }
}
