//! Elements and their interpolation bases.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{MeshError, MeshResult};

/// Identifier of a node within a region.
pub type NodeId = u32;

/// Identifier of an element within one mesh of a region.
pub type ElementId = u32;

/// Tolerance used when testing local coordinates against an element domain.
const XI_TOLERANCE: f64 = 1e-9;

/// Element shape with a linear interpolation basis.
///
/// Tensor-product shapes order their nodes with xi1 varying fastest, then
/// xi2, then xi3. Simplex shapes list the origin node first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ElementShape {
    /// Two-node line.
    Line2,
    /// Three-node triangle.
    Triangle3,
    /// Four-node bilinear square.
    Quad4,
    /// Four-node tetrahedron.
    Tetrahedron4,
    /// Eight-node trilinear cube.
    Hexahedron8,
}

impl ElementShape {
    /// Dimension of the element (1, 2 or 3).
    #[must_use]
    pub const fn dimension(self) -> usize {
        match self {
            Self::Line2 => 1,
            Self::Triangle3 | Self::Quad4 => 2,
            Self::Tetrahedron4 | Self::Hexahedron8 => 3,
        }
    }

    /// Number of nodes the shape interpolates from.
    #[must_use]
    pub const fn node_count(self) -> usize {
        match self {
            Self::Line2 => 2,
            Self::Triangle3 => 3,
            Self::Quad4 | Self::Tetrahedron4 => 4,
            Self::Hexahedron8 => 8,
        }
    }

    /// Short shape name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Line2 => "line2",
            Self::Triangle3 => "triangle3",
            Self::Quad4 => "quad4",
            Self::Tetrahedron4 => "tetrahedron4",
            Self::Hexahedron8 => "hexahedron8",
        }
    }

    /// Returns true if `xi` lies in the parameter domain of the shape.
    ///
    /// Components beyond the shape's dimension are ignored.
    #[must_use]
    pub fn contains(self, xi: [f64; 3]) -> bool {
        let used = &xi[..self.dimension()];
        if used.iter().any(|&x| x < -XI_TOLERANCE) {
            return false;
        }
        match self {
            Self::Line2 | Self::Quad4 | Self::Hexahedron8 => {
                used.iter().all(|&x| x <= 1.0 + XI_TOLERANCE)
            }
            Self::Triangle3 | Self::Tetrahedron4 => used.iter().sum::<f64>() <= 1.0 + XI_TOLERANCE,
        }
    }

    /// Evaluates the basis functions at `xi`.
    ///
    /// The returned weights are ordered like the element's nodes and sum to one.
    #[must_use]
    pub fn basis(self, xi: [f64; 3]) -> Vec<f64> {
        let [a, b, c] = xi;
        match self {
            Self::Line2 => vec![1.0 - a, a],
            Self::Triangle3 => vec![1.0 - a - b, a, b],
            Self::Quad4 => vec![
                (1.0 - a) * (1.0 - b),
                a * (1.0 - b),
                (1.0 - a) * b,
                a * b,
            ],
            Self::Tetrahedron4 => vec![1.0 - a - b - c, a, b, c],
            Self::Hexahedron8 => vec![
                (1.0 - a) * (1.0 - b) * (1.0 - c),
                a * (1.0 - b) * (1.0 - c),
                (1.0 - a) * b * (1.0 - c),
                a * b * (1.0 - c),
                (1.0 - a) * (1.0 - b) * c,
                a * (1.0 - b) * c,
                (1.0 - a) * b * c,
                a * b * c,
            ],
        }
    }
}

/// An element of a mesh: an identifier, a shape and its node identifiers.
///
/// # Example
///
/// ```
/// use fe_mesh::{Element, ElementShape};
///
/// let element = Element::new(7, ElementShape::Quad4, vec![1, 2, 3, 4]);
/// assert_eq!(element.dimension(), 2);
/// assert!(element.uses_node(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Element {
    /// Element identifier, unique within its mesh.
    pub id: ElementId,
    /// Interpolation shape.
    pub shape: ElementShape,
    /// Node identifiers in basis order.
    pub nodes: Vec<NodeId>,
}

impl Element {
    /// Creates an element. The node count is checked when it is added to a region.
    #[must_use]
    pub fn new(id: ElementId, shape: ElementShape, nodes: Vec<NodeId>) -> Self {
        Self { id, shape, nodes }
    }

    /// Dimension of the element.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.shape.dimension()
    }

    /// Returns true if the element interpolates from `node`.
    #[must_use]
    pub fn uses_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Returns true if every node of `other` is also a node of this element.
    ///
    /// This is how faces and lines are recognised as part of an element's
    /// closure.
    #[must_use]
    pub fn contains_all_nodes_of(&self, other: &Self) -> bool {
        other.nodes.iter().all(|n| self.nodes.contains(n))
    }

    /// Checks that the node list matches the shape.
    pub(crate) fn validate(&self) -> MeshResult<()> {
        let expected = self.shape.node_count();
        if self.nodes.len() == expected {
            Ok(())
        } else {
            Err(MeshError::WrongNodeCount {
                id: self.id,
                shape: self.shape.as_str(),
                expected,
                got: self.nodes.len(),
            })
        }
    }
}
