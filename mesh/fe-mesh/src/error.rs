//! Error types for region construction and field evaluation.

use thiserror::Error;

use crate::{ElementId, NodeId};

/// Result type for region operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur while building or querying a region.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MeshError {
    /// A node with this identifier already exists.
    #[error("node {id} already exists")]
    DuplicateNode {
        /// The duplicate node identifier.
        id: NodeId,
    },

    /// An element with this identifier already exists in the mesh.
    #[error("element {id} already exists in the {dimension}D mesh")]
    DuplicateElement {
        /// The duplicate element identifier.
        id: ElementId,
        /// Dimension of the mesh.
        dimension: usize,
    },

    /// An element is stored under another identifier or in the wrong mesh.
    #[error("element {id} is inconsistent with the {dimension}D mesh holding it")]
    MisplacedElement {
        /// Key the element is stored under.
        id: ElementId,
        /// Dimension of the mesh.
        dimension: usize,
    },

    /// A field with this name already exists.
    #[error("field '{name}' already exists")]
    DuplicateField {
        /// The duplicate field name.
        name: String,
    },

    /// The node was not found.
    #[error("node {id} not found")]
    NodeNotFound {
        /// The missing node identifier.
        id: NodeId,
    },

    /// The element was not found.
    #[error("element {id} not found in the {dimension}D mesh")]
    ElementNotFound {
        /// The missing element identifier.
        id: ElementId,
        /// Dimension of the mesh that was searched.
        dimension: usize,
    },

    /// The field was not found.
    #[error("field '{name}' not found")]
    FieldNotFound {
        /// The missing field name.
        name: String,
    },

    /// Mesh dimension outside 1..=3.
    #[error("invalid mesh dimension {dimension}")]
    InvalidDimension {
        /// The requested dimension.
        dimension: usize,
    },

    /// Element node list does not match its shape.
    #[error("element {id} of shape {shape} needs {expected} nodes, got {got}")]
    WrongNodeCount {
        /// The element identifier.
        id: ElementId,
        /// Shape name.
        shape: &'static str,
        /// Nodes required by the shape.
        expected: usize,
        /// Nodes supplied.
        got: usize,
    },

    /// The field has a different type than the operation requires.
    #[error("field '{name}' is not a {expected} field")]
    WrongFieldType {
        /// The field name.
        name: String,
        /// The type the operation required.
        expected: &'static str,
    },

    /// Value count does not match the field's component count.
    #[error("field '{name}' has {expected} components, got {got} values")]
    ComponentMismatch {
        /// The field name.
        name: String,
        /// Component count of the field.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// The field has no value at the requested location.
    #[error("field '{name}' is not defined at {location}")]
    NotDefined {
        /// The field name.
        name: String,
        /// Human-readable location.
        location: String,
    },

    /// Local coordinates lie outside the element's parameter domain.
    #[error("xi {xi:?} lies outside element {element}")]
    OutsideElement {
        /// The element identifier.
        element: ElementId,
        /// The offending local coordinates.
        xi: [f64; 3],
    },
}
