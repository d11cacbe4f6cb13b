//! Regions: nodes, meshes and fields.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    Element, ElementId, Field, GroupField, Location, MAX_DIMENSION, MeshError, MeshResult, NodeId,
    SubelementHandling,
};

/// The elements of one dimension within a region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    dimension: usize,
    elements: BTreeMap<ElementId, Element>,
}

impl Mesh {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            elements: BTreeMap::new(),
        }
    }

    /// Mesh dimension (1, 2 or 3).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the mesh has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Looks up an element.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Elements in ascending identifier order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.values()
    }

    /// The element with the lowest identifier.
    #[must_use]
    pub fn first_element(&self) -> Option<&Element> {
        self.elements.values().next()
    }
}

/// A region: a node set, meshes of dimension 1 to 3 and an ordered field list.
///
/// Field iteration order is definition order.
///
/// # Example
///
/// ```
/// use fe_mesh::{Element, ElementShape, Field, Region};
///
/// let mut region = Region::new();
/// for id in 1..=3 {
///     region.add_node(id).unwrap();
/// }
/// region
///     .add_element(Element::new(1, ElementShape::Triangle3, vec![1, 2, 3]))
///     .unwrap();
/// region.add_field(Field::group("skin")).unwrap();
///
/// assert_eq!(region.node_count(), 3);
/// assert_eq!(region.highest_dimension_mesh().unwrap().dimension(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    name: Option<String>,
    nodes: BTreeSet<NodeId>,
    meshes: [Mesh; MAX_DIMENSION],
    fields: Vec<Field>,
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

impl Region {
    /// Creates an empty, unnamed region.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            nodes: BTreeSet::new(),
            meshes: [Mesh::new(1), Mesh::new(2), Mesh::new(3)],
            fields: Vec::new(),
        }
    }

    /// Region name, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the region name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    // =========================================================================
    // Nodes and elements
    // =========================================================================

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DuplicateNode`] if the identifier is taken.
    pub fn add_node(&mut self, id: NodeId) -> MeshResult<()> {
        if self.nodes.insert(id) {
            Ok(())
        } else {
            Err(MeshError::DuplicateNode { id })
        }
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Node identifiers in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The mesh of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidDimension`] outside 1..=3.
    pub fn mesh(&self, dimension: usize) -> MeshResult<&Mesh> {
        dimension
            .checked_sub(1)
            .and_then(|i| self.meshes.get(i))
            .ok_or(MeshError::InvalidDimension { dimension })
    }

    /// Meshes from dimension 1 to 3.
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> + '_ {
        self.meshes.iter()
    }

    /// The non-empty mesh of highest dimension, scanning from 3 down to 1.
    #[must_use]
    pub fn highest_dimension_mesh(&self) -> Option<&Mesh> {
        self.meshes.iter().rev().find(|mesh| !mesh.is_empty())
    }

    /// Total number of elements across all meshes.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.meshes.iter().map(Mesh::len).sum()
    }

    /// Adds an element to the mesh matching its shape's dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the node count does not match the shape, a node
    /// does not exist, or the identifier is already used in that mesh.
    pub fn add_element(&mut self, element: Element) -> MeshResult<()> {
        element.validate()?;
        if let Some(&missing) = element.nodes.iter().find(|n| !self.nodes.contains(n)) {
            return Err(MeshError::NodeNotFound { id: missing });
        }
        let dimension = element.dimension();
        let mesh = dimension
            .checked_sub(1)
            .and_then(|i| self.meshes.get_mut(i))
            .ok_or(MeshError::InvalidDimension { dimension })?;
        if mesh.elements.contains_key(&element.id) {
            return Err(MeshError::DuplicateElement {
                id: element.id,
                dimension,
            });
        }
        mesh.elements.insert(element.id, element);
        Ok(())
    }

    /// Checks that every element matches its mesh dimension and shape and
    /// references existing nodes.
    ///
    /// Used after a region is built by other means than the `add_*` methods,
    /// such as deserialization.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> MeshResult<()> {
        for (index, mesh) in self.meshes.iter().enumerate() {
            if mesh.dimension != index + 1 {
                return Err(MeshError::InvalidDimension {
                    dimension: mesh.dimension,
                });
            }
            for (&id, element) in &mesh.elements {
                element.validate()?;
                if element.id != id || element.dimension() != mesh.dimension {
                    return Err(MeshError::MisplacedElement {
                        id,
                        dimension: mesh.dimension,
                    });
                }
                if let Some(&missing) = element.nodes.iter().find(|n| !self.nodes.contains(n)) {
                    return Err(MeshError::NodeNotFound { id: missing });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Fields in definition order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter()
    }

    /// Field names in definition order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(Field::name)
    }

    /// Looks up a field by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Looks up a field by exact name for modification.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Looks up a field, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FieldNotFound`].
    pub fn require_field(&self, name: &str) -> MeshResult<&Field> {
        self.field(name).ok_or_else(|| MeshError::FieldNotFound {
            name: name.to_string(),
        })
    }

    /// Adds a field.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DuplicateField`] if the name is taken.
    pub fn add_field(&mut self, field: Field) -> MeshResult<()> {
        if self.field(field.name()).is_some() {
            return Err(MeshError::DuplicateField {
                name: field.name().to_string(),
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Returns the named group, creating an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::WrongFieldType`] if a non-group field has the name.
    pub fn find_or_create_group(&mut self, name: &str) -> MeshResult<&mut GroupField> {
        let index = match self.fields.iter().position(|f| f.name() == name) {
            Some(index) => index,
            None => {
                self.fields.push(Field::group(name));
                self.fields.len() - 1
            }
        };
        self.fields[index]
            .as_group_mut()
            .ok_or_else(|| MeshError::WrongFieldType {
                name: name.to_string(),
                expected: "group",
            })
    }

    /// Adds every element of the given dimension satisfying `predicate` to a group.
    ///
    /// When the group's subelement handling is [`SubelementHandling::Full`],
    /// the lower-dimension elements whose nodes all belong to an added
    /// element, and the added elements' nodes, join the group too.
    ///
    /// Returns the number of elements of `dimension` that matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the group does not exist, is not a group, or the
    /// dimension is invalid.
    pub fn add_elements_conditional<F>(
        &mut self,
        group: &str,
        dimension: usize,
        predicate: F,
    ) -> MeshResult<usize>
    where
        F: Fn(&Element) -> bool,
    {
        let full = self
            .require_field(group)?
            .as_group()
            .ok_or_else(|| MeshError::WrongFieldType {
                name: group.to_string(),
                expected: "group",
            })?
            .subelement_handling()
            == SubelementHandling::Full;

        let selected: Vec<&Element> = self
            .mesh(dimension)?
            .elements()
            .filter(|&e| predicate(e))
            .collect();
        let matched = selected.len();

        let mut additions: Vec<(usize, ElementId)> =
            selected.iter().map(|e| (dimension, e.id)).collect();
        let mut nodes: BTreeSet<NodeId> = BTreeSet::new();

        if full {
            let mut by_node: HashMap<NodeId, Vec<&Element>> = HashMap::new();
            for &element in &selected {
                nodes.extend(element.nodes.iter().copied());
                for &node in &element.nodes {
                    by_node.entry(node).or_default().push(element);
                }
            }
            for lower in self.meshes.iter().take(dimension - 1) {
                for candidate in lower.elements() {
                    let Some(first) = candidate.nodes.first() else {
                        continue;
                    };
                    let inside = by_node.get(first).is_some_and(|hosts| {
                        hosts.iter().any(|h| h.contains_all_nodes_of(candidate))
                    });
                    if inside {
                        additions.push((lower.dimension(), candidate.id));
                    }
                }
            }
        }

        let target = self
            .field_mut(group)
            .and_then(Field::as_group_mut)
            .ok_or_else(|| MeshError::FieldNotFound {
                name: group.to_string(),
            })?;
        for (dim, id) in additions {
            target.add_element(dim, id);
        }
        for node in nodes {
            target.add_node(node);
        }
        Ok(matched)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluates a finite-element field at a location.
    ///
    /// At a node, the node's parameters are returned. Inside an element, the
    /// node parameters are interpolated with the element's basis.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not finite-element, the
    /// element is missing, `xi` is outside the element, or any needed node
    /// has no parameters.
    pub fn evaluate_real(&self, field: &str, location: &Location) -> MeshResult<Vec<f64>> {
        let f = self.require_field(field)?;
        let fe = f.as_finite_element().ok_or_else(|| MeshError::WrongFieldType {
            name: field.to_string(),
            expected: "finite element",
        })?;
        let not_defined = || MeshError::NotDefined {
            name: field.to_string(),
            location: location.to_string(),
        };

        match *location {
            Location::Node(node) => fe.node_values.get(&node).cloned().ok_or_else(not_defined),
            Location::Element {
                dimension,
                element,
                xi,
            } => {
                let element = self
                    .mesh(dimension)?
                    .element(element)
                    .ok_or(MeshError::ElementNotFound {
                        id: element,
                        dimension,
                    })?;
                if !element.shape.contains(xi) {
                    return Err(MeshError::OutsideElement {
                        element: element.id,
                        xi,
                    });
                }
                let mut result = vec![0.0; fe.components];
                for (node, weight) in element.nodes.iter().zip(element.shape.basis(xi)) {
                    let values = fe.node_values.get(node).ok_or_else(not_defined)?;
                    for (r, v) in result.iter_mut().zip(values) {
                        *r += weight * v;
                    }
                }
                Ok(result)
            }
        }
    }

    /// Returns true if `field` can be evaluated at `location`.
    ///
    /// Finite-element fields are defined inside an element when every node of
    /// the element has parameters. Stored fields are only defined at nodes.
    #[must_use]
    pub fn is_defined_at(&self, field: &Field, location: &Location) -> bool {
        match *location {
            Location::Node(node) => field.has_node_value(node),
            Location::Element {
                dimension,
                element,
                ..
            } => {
                let Some(fe) = field.as_finite_element() else {
                    return false;
                };
                self.mesh(dimension)
                    .ok()
                    .and_then(|mesh| mesh.element(element))
                    .is_some_and(|e| e.nodes.iter().all(|n| fe.node_values.contains_key(n)))
            }
        }
    }

    /// Evaluates a stored string field at a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing, not a stored string, or has
    /// no value at the node.
    pub fn evaluate_string(&self, field: &str, node: NodeId) -> MeshResult<&str> {
        match self.require_field(field)?.data() {
            crate::FieldData::StoredString { values } => {
                values
                    .get(&node)
                    .map(String::as_str)
                    .ok_or_else(|| MeshError::NotDefined {
                        name: field.to_string(),
                        location: Location::Node(node).to_string(),
                    })
            }
            _ => Err(MeshError::WrongFieldType {
                name: field.to_string(),
                expected: "stored string",
            }),
        }
    }

    /// Returns the element location stored by a mesh location field at a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing, not a stored mesh location,
    /// or has no value at the node.
    pub fn mesh_location(&self, field: &str, node: NodeId) -> MeshResult<Location> {
        let ml = self
            .require_field(field)?
            .as_mesh_location()
            .ok_or_else(|| MeshError::WrongFieldType {
                name: field.to_string(),
                expected: "stored mesh location",
            })?;
        let stored = ml.values.get(&node).ok_or_else(|| MeshError::NotDefined {
            name: field.to_string(),
            location: Location::Node(node).to_string(),
        })?;
        Ok(Location::element(ml.mesh_dimension, stored.element, stored.xi))
    }

    /// Evaluates `host` at the mesh location stored by `location_field` at `node`.
    ///
    /// This is the embedded field: the host field read at a separately stored
    /// element location rather than at the node itself.
    ///
    /// # Errors
    ///
    /// Returns an error if either evaluation step fails.
    pub fn evaluate_embedded(
        &self,
        host: &str,
        location_field: &str,
        node: NodeId,
    ) -> MeshResult<Vec<f64>> {
        let location = self.mesh_location(location_field, node)?;
        self.evaluate_real(host, &location)
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Merges another region into this one.
    ///
    /// Nodes are united, identical elements are shared, and same-named fields
    /// of compatible type have their values combined.
    ///
    /// # Errors
    ///
    /// Returns an error if an element identifier is reused with different
    /// content, or a same-named field has an incompatible type.
    pub fn merge(&mut self, other: Self) -> MeshResult<()> {
        if self.name.is_none() {
            self.name = other.name;
        }
        self.nodes.extend(other.nodes);
        for (mine, theirs) in self.meshes.iter_mut().zip(other.meshes) {
            for (id, element) in theirs.elements {
                match mine.elements.get(&id) {
                    Some(existing) if *existing != element => {
                        return Err(MeshError::DuplicateElement {
                            id,
                            dimension: mine.dimension,
                        });
                    }
                    Some(_) => {}
                    None => {
                        mine.elements.insert(id, element);
                    }
                }
            }
        }
        for field in other.fields {
            match self.field_mut(field.name()) {
                Some(existing) => existing.merge_from(field)?,
                None => self.fields.push(field),
            }
        }
        Ok(())
    }
}
