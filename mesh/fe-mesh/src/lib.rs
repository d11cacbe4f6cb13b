//! Finite-element region model.
//!
//! This crate provides the data structures that anatomical meshes are read
//! into and queried through:
//!
//! - [`Region`] - Nodes, elements of dimension 1 to 3, and named fields
//! - [`Element`] - A linear Lagrange or simplex element over node identifiers
//! - [`Field`] - A typed field: finite-element, stored string, stored mesh
//!   location or group
//! - [`Location`] - A node, or an element plus local (xi) coordinates
//!
//! The field set of a region is not fixed ahead of time. Callers discover
//! fields by name and type, then evaluate them at locations.
//!
//! # Layer 0 Crate
//!
//! This crate has no knowledge of organs, scaffolds or registration. It can
//! be used by any tool that needs to read, tag or evaluate finite-element
//! meshes.
//!
//! # Example
//!
//! ```
//! use fe_mesh::{Element, ElementShape, Field, Location, Region};
//!
//! let mut region = Region::new();
//! region.add_node(1).unwrap();
//! region.add_node(2).unwrap();
//! region
//!     .add_element(Element::new(1, ElementShape::Line2, vec![1, 2]))
//!     .unwrap();
//!
//! let mut coordinates = Field::coordinates("coordinates", 3);
//! coordinates.set_node_values(1, &[0.0, 0.0, 0.0]).unwrap();
//! coordinates.set_node_values(2, &[2.0, 0.0, 0.0]).unwrap();
//! region.add_field(coordinates).unwrap();
//!
//! let mid = region
//!     .evaluate_real("coordinates", &Location::element(1, 1, [0.5, 0.0, 0.0]))
//!     .unwrap();
//! assert!((mid[0] - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod element;
mod error;
mod field;
mod group;
mod location;
mod region;

pub use element::{Element, ElementId, ElementShape, NodeId};
pub use error::{MeshError, MeshResult};
pub use field::{Field, FieldData, FiniteElementField, MeshLocation, MeshLocationField};
pub use group::{GroupField, SubelementHandling};
pub use location::Location;
pub use region::{Mesh, Region};

/// Highest mesh dimension a region can hold.
pub const MAX_DIMENSION: usize = 3;

// Re-export nalgebra types for convenience
pub use nalgebra::Point3;
