//! Typed fields.
//!
//! A [`Field`] pairs a name with its data. The data variant determines how
//! the field is evaluated: finite-element fields interpolate node parameters
//! across elements, stored fields hold one value per node, and group fields
//! hold membership sets.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ElementId, GroupField, MeshError, MeshResult, NodeId};

/// A point inside a mesh: an element and local coordinates within it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshLocation {
    /// Element identifier within the host mesh.
    pub element: ElementId,
    /// Local coordinates within the element.
    pub xi: [f64; 3],
}

impl MeshLocation {
    /// Creates a mesh location.
    #[must_use]
    pub const fn new(element: ElementId, xi: [f64; 3]) -> Self {
        Self { element, xi }
    }
}

/// Node-based parameters of a finite-element field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiniteElementField {
    /// Number of components.
    pub components: usize,
    /// Whether the field is typed as a coordinate field.
    pub coordinate: bool,
    /// Parameters per node, `components` values each.
    pub node_values: BTreeMap<NodeId, Vec<f64>>,
}

/// Per-node locations within a mesh of fixed dimension.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshLocationField {
    /// Dimension of the host mesh the locations refer to.
    pub mesh_dimension: usize,
    /// Location per node.
    pub values: BTreeMap<NodeId, MeshLocation>,
}

/// The data carried by a field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldData {
    /// Interpolated from node parameters.
    FiniteElement(FiniteElementField),
    /// One text value per node.
    StoredString {
        /// Text per node.
        values: BTreeMap<NodeId, String>,
    },
    /// One mesh location per node.
    StoredMeshLocation(MeshLocationField),
    /// Named membership sets.
    Group(GroupField),
}

/// A named field of a region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Field {
    name: String,
    data: FieldData,
}

impl Field {
    /// Creates a field from a name and data.
    #[must_use]
    pub fn new(name: impl Into<String>, data: FieldData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Creates an empty finite-element field typed as coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use fe_mesh::Field;
    ///
    /// let field = Field::coordinates("coordinates", 3);
    /// assert!(field.is_coordinate_type());
    /// assert_eq!(field.component_count(), 3);
    /// ```
    #[must_use]
    pub fn coordinates(name: impl Into<String>, components: usize) -> Self {
        Self::new(
            name,
            FieldData::FiniteElement(FiniteElementField {
                components,
                coordinate: true,
                node_values: BTreeMap::new(),
            }),
        )
    }

    /// Creates an empty finite-element field that is not typed as coordinates.
    #[must_use]
    pub fn finite_element(name: impl Into<String>, components: usize) -> Self {
        Self::new(
            name,
            FieldData::FiniteElement(FiniteElementField {
                components,
                coordinate: false,
                node_values: BTreeMap::new(),
            }),
        )
    }

    /// Creates an empty stored string field.
    #[must_use]
    pub fn stored_string(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldData::StoredString {
                values: BTreeMap::new(),
            },
        )
    }

    /// Creates an empty stored mesh location field over the mesh of `mesh_dimension`.
    #[must_use]
    pub fn stored_mesh_location(name: impl Into<String>, mesh_dimension: usize) -> Self {
        Self::new(
            name,
            FieldData::StoredMeshLocation(MeshLocationField {
                mesh_dimension,
                values: BTreeMap::new(),
            }),
        )
    }

    /// Creates an empty group field.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, FieldData::Group(GroupField::default()))
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field data.
    #[must_use]
    pub fn data(&self) -> &FieldData {
        &self.data
    }

    /// Short type name used in messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.data {
            FieldData::FiniteElement(_) => "finite element",
            FieldData::StoredString { .. } => "stored string",
            FieldData::StoredMeshLocation(_) => "stored mesh location",
            FieldData::Group(_) => "group",
        }
    }

    /// Returns true for finite-element fields typed as coordinates.
    #[must_use]
    pub fn is_coordinate_type(&self) -> bool {
        matches!(&self.data, FieldData::FiniteElement(fe) if fe.coordinate)
    }

    /// Number of components; non-numeric fields have one.
    #[must_use]
    pub fn component_count(&self) -> usize {
        match &self.data {
            FieldData::FiniteElement(fe) => fe.components,
            _ => 1,
        }
    }

    /// Finite-element data, if this is a finite-element field.
    #[must_use]
    pub fn as_finite_element(&self) -> Option<&FiniteElementField> {
        match &self.data {
            FieldData::FiniteElement(fe) => Some(fe),
            _ => None,
        }
    }

    /// Mesh location data, if this is a stored mesh location field.
    #[must_use]
    pub fn as_mesh_location(&self) -> Option<&MeshLocationField> {
        match &self.data {
            FieldData::StoredMeshLocation(ml) => Some(ml),
            _ => None,
        }
    }

    /// Group data, if this is a group field.
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupField> {
        match &self.data {
            FieldData::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Mutable group data, if this is a group field.
    pub fn as_group_mut(&mut self) -> Option<&mut GroupField> {
        match &mut self.data {
            FieldData::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Returns true if this is a stored string field.
    #[must_use]
    pub fn is_stored_string(&self) -> bool {
        matches!(self.data, FieldData::StoredString { .. })
    }

    /// Returns true if the field stores a value for `node`.
    ///
    /// Group fields report membership.
    #[must_use]
    pub fn has_node_value(&self, node: NodeId) -> bool {
        match &self.data {
            FieldData::FiniteElement(fe) => fe.node_values.contains_key(&node),
            FieldData::StoredString { values } => values.contains_key(&node),
            FieldData::StoredMeshLocation(ml) => ml.values.contains_key(&node),
            FieldData::Group(group) => group.contains_node(node),
        }
    }

    /// Sets the node parameters of a finite-element field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not finite-element or `values` does
    /// not have one entry per component.
    pub fn set_node_values(&mut self, node: NodeId, values: &[f64]) -> MeshResult<()> {
        let name = &self.name;
        match &mut self.data {
            FieldData::FiniteElement(fe) => {
                if values.len() != fe.components {
                    return Err(MeshError::ComponentMismatch {
                        name: name.clone(),
                        expected: fe.components,
                        got: values.len(),
                    });
                }
                fe.node_values.insert(node, values.to_vec());
                Ok(())
            }
            _ => Err(MeshError::WrongFieldType {
                name: name.clone(),
                expected: "finite element",
            }),
        }
    }

    /// Assigns the text of a stored string field at `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a stored string field.
    pub fn set_node_string(&mut self, node: NodeId, value: impl Into<String>) -> MeshResult<()> {
        match &mut self.data {
            FieldData::StoredString { values } => {
                values.insert(node, value.into());
                Ok(())
            }
            _ => Err(MeshError::WrongFieldType {
                name: self.name.clone(),
                expected: "stored string",
            }),
        }
    }

    /// Assigns the location of a stored mesh location field at `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a stored mesh location field.
    pub fn set_node_location(&mut self, node: NodeId, location: MeshLocation) -> MeshResult<()> {
        match &mut self.data {
            FieldData::StoredMeshLocation(ml) => {
                ml.values.insert(node, location);
                Ok(())
            }
            _ => Err(MeshError::WrongFieldType {
                name: self.name.clone(),
                expected: "stored mesh location",
            }),
        }
    }

    /// Merges values from a field of the same name and type.
    ///
    /// Values from `other` replace values for the same node.
    pub(crate) fn merge_from(&mut self, other: Self) -> MeshResult<()> {
        match (&mut self.data, other.data) {
            (FieldData::FiniteElement(a), FieldData::FiniteElement(b))
                if a.components == b.components =>
            {
                a.node_values.extend(b.node_values);
                a.coordinate |= b.coordinate;
            }
            (FieldData::StoredString { values: a }, FieldData::StoredString { values: b }) => {
                a.extend(b);
            }
            (FieldData::StoredMeshLocation(a), FieldData::StoredMeshLocation(b))
                if a.mesh_dimension == b.mesh_dimension =>
            {
                a.values.extend(b.values);
            }
            (FieldData::Group(a), FieldData::Group(b)) => a.union_with(&b),
            _ => {
                return Err(MeshError::WrongFieldType {
                    name: self.name.clone(),
                    expected: "compatible",
                });
            }
        }
        Ok(())
    }
}
