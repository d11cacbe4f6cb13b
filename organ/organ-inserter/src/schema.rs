//! Field schema discovery.
//!
//! Meshes arrive without a fixed schema. This module finds the coordinate
//! field and the marker field triple by inspecting field types and names,
//! and returns either a complete [`FieldSchema`] or a [`SchemaError`].

use fe_mesh::{Field, FieldData, Location, Region};
use thiserror::Error;
use tracing::debug;

/// Errors from schema discovery.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// No field qualifies as the coordinate field.
    #[error("no 3-component finite-element coordinate field is defined on the mesh")]
    CoordinatesNotFound,

    /// The named coordinate field exists but cannot hold 3D positions.
    #[error("field '{name}' cannot be used as coordinates: {reason}")]
    InvalidCoordinateField {
        /// Field name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// One or more of the marker name, location and group fields is missing.
    #[error("could not find marker fields: missing {}", .missing.join(", "))]
    MarkerFieldsNotFound {
        /// Missing categories.
        missing: Vec<&'static str>,
    },

    /// A marker field was found by name but has the wrong type.
    #[error("marker field '{name}' must be a {expected} field")]
    MarkerFieldType {
        /// Field name.
        name: String,
        /// Required field type.
        expected: &'static str,
    },
}

/// The resolved coordinate field of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateField {
    name: String,
}

impl CoordinateField {
    /// Resolves the coordinate field.
    ///
    /// With a `hint`, the named field is looked up directly. Otherwise the
    /// first element of the highest-dimension non-empty mesh is taken and
    /// the first field, in definition order, that is coordinate-typed, has 3
    /// components, is finite-element and is defined on that element wins.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::CoordinatesNotFound`] if nothing qualifies, or
    /// [`SchemaError::InvalidCoordinateField`] if the hinted field is unusable.
    pub fn discover(region: &Region, hint: Option<&str>) -> Result<Self, SchemaError> {
        if let Some(name) = hint {
            let field = region.field(name).ok_or(SchemaError::CoordinatesNotFound)?;
            return Self::from_field(field);
        }

        let mesh = region
            .highest_dimension_mesh()
            .ok_or(SchemaError::CoordinatesNotFound)?;
        let element = mesh.first_element().ok_or(SchemaError::CoordinatesNotFound)?;
        let location = Location::element(mesh.dimension(), element.id, [0.0; 3]);

        let field = region
            .fields()
            .find(|f| {
                f.is_coordinate_type()
                    && f.component_count() == 3
                    && f.as_finite_element().is_some()
                    && region.is_defined_at(f, &location)
            })
            .ok_or(SchemaError::CoordinatesNotFound)?;

        debug!(field = field.name(), dimension = mesh.dimension(), "Discovered coordinate field");
        Ok(Self {
            name: field.name().to_string(),
        })
    }

    /// Validates that `field` holds 3-component finite-element values.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidCoordinateField`] otherwise.
    pub fn from_field(field: &Field) -> Result<Self, SchemaError> {
        let invalid = |reason| SchemaError::InvalidCoordinateField {
            name: field.name().to_string(),
            reason,
        };
        let fe = field
            .as_finite_element()
            .ok_or_else(|| invalid("not a finite-element field"))?;
        if fe.components != 3 {
            return Err(invalid("does not have exactly 3 components"));
        }
        Ok(Self {
            name: field.name().to_string(),
        })
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The marker name, location and group fields of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFields {
    /// Stored string field naming each marker.
    pub name: String,
    /// Stored mesh location field placing each marker in the mesh.
    pub location: String,
    /// Group whose nodes are the markers.
    pub group: String,
}

impl MarkerFields {
    /// Classifies field names containing "marker" (case-insensitive).
    ///
    /// A name also containing "name" is the name field; otherwise one
    /// containing "location" is the location field; otherwise one without a
    /// `.` is the group. The last match in definition order wins.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MarkerFieldsNotFound`] unless all three are
    /// found, or [`SchemaError::MarkerFieldType`] if one has the wrong type.
    pub fn discover(region: &Region) -> Result<Self, SchemaError> {
        let mut name = None;
        let mut location = None;
        let mut group = None;

        for field_name in region.field_names() {
            let lower = field_name.to_lowercase();
            if !lower.contains("marker") {
                continue;
            }
            if lower.contains("name") {
                name = Some(field_name);
            } else if lower.contains("location") {
                location = Some(field_name);
            } else if !field_name.contains('.') {
                group = Some(field_name);
            }
        }

        let (Some(name), Some(location), Some(group)) = (name, location, group) else {
            let missing = [("name", name), ("location", location), ("group", group)]
                .into_iter()
                .filter(|(_, found)| found.is_none())
                .map(|(category, _)| category)
                .collect();
            return Err(SchemaError::MarkerFieldsNotFound { missing });
        };

        check_type(region, name, "stored string", |d| {
            matches!(d, FieldData::StoredString { .. })
        })?;
        check_type(region, location, "stored mesh location", |d| {
            matches!(d, FieldData::StoredMeshLocation(_))
        })?;
        check_type(region, group, "group", |d| matches!(d, FieldData::Group(_)))?;

        Ok(Self {
            name: name.to_string(),
            location: location.to_string(),
            group: group.to_string(),
        })
    }
}

fn check_type(
    region: &Region,
    name: &str,
    expected: &'static str,
    accepts: impl Fn(&FieldData) -> bool,
) -> Result<(), SchemaError> {
    match region.field(name) {
        Some(field) if accepts(field.data()) => Ok(()),
        _ => Err(SchemaError::MarkerFieldType {
            name: name.to_string(),
            expected,
        }),
    }
}

/// A fully resolved schema: coordinates plus the marker triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Coordinate field.
    pub coordinates: CoordinateField,
    /// Marker fields.
    pub markers: MarkerFields,
}

impl FieldSchema {
    /// Resolves the marker triple, then the coordinate field.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`]; no partial schema is exposed.
    pub fn resolve(region: &Region, coordinate_hint: Option<&str>) -> Result<Self, SchemaError> {
        let markers = MarkerFields::discover(region)?;
        let coordinates = CoordinateField::discover(region, coordinate_hint)?;
        Ok(Self {
            coordinates,
            markers,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fe_mesh::{Element, ElementShape};

    fn make_region(fields: Vec<Field>) -> Region {
        let mut region = Region::new();
        for id in 1..=3 {
            region.add_node(id).unwrap();
        }
        region
            .add_element(Element::new(1, ElementShape::Triangle3, vec![1, 2, 3]))
            .unwrap();
        for field in fields {
            region.add_field(field).unwrap();
        }
        region
    }

    fn coordinates(name: &str, components: usize, nodes: &[u32]) -> Field {
        let mut field = Field::coordinates(name, components);
        for &node in nodes {
            field.set_node_values(node, &vec![0.0; components]).unwrap();
        }
        field
    }

    fn marker_fields() -> Vec<Field> {
        vec![
            Field::group("marker"),
            Field::stored_string("marker_name"),
            Field::stored_mesh_location("marker_location", 3),
        ]
    }

    #[test]
    fn discovery_skips_unusable_fields() {
        let region = make_region(vec![
            Field::finite_element("pressure", 3),
            coordinates("flat", 2, &[1, 2, 3]),
            coordinates("partial", 3, &[1, 2]),
            coordinates("geometry", 3, &[1, 2, 3]),
            coordinates("later", 3, &[1, 2, 3]),
        ]);
        let found = CoordinateField::discover(&region, None).unwrap();
        assert_eq!(found.name(), "geometry");
    }

    #[test]
    fn hint_is_looked_up_directly() {
        let region = make_region(vec![
            coordinates("geometry", 3, &[1, 2, 3]),
            coordinates("fitted", 3, &[]),
            Field::stored_string("label"),
        ]);
        assert_eq!(
            CoordinateField::discover(&region, Some("fitted")).unwrap().name(),
            "fitted"
        );
        assert_eq!(
            CoordinateField::discover(&region, Some("absent")),
            Err(SchemaError::CoordinatesNotFound)
        );
        assert!(matches!(
            CoordinateField::discover(&region, Some("label")),
            Err(SchemaError::InvalidCoordinateField { .. })
        ));
    }

    #[test]
    fn no_mesh_means_no_coordinates() {
        let mut region = Region::new();
        region.add_node(1).unwrap();
        region.add_field(coordinates("coordinates", 3, &[1])).unwrap();
        assert_eq!(
            CoordinateField::discover(&region, None),
            Err(SchemaError::CoordinatesNotFound)
        );
    }

    #[test]
    fn marker_triple_classification() {
        let region = make_region(marker_fields());
        let markers = MarkerFields::discover(&region).unwrap();
        assert_eq!(markers.name, "marker_name");
        assert_eq!(markers.location, "marker_location");
        assert_eq!(markers.group, "marker");
    }

    #[test]
    fn marker_matching_is_case_insensitive_and_last_wins() {
        let region = make_region(vec![
            Field::group("Marker"),
            Field::stored_string("Marker Name"),
            Field::stored_mesh_location("marker_location", 3),
            Field::group("fiducial markers"),
            Field::stored_string("marker.name.old"),
        ]);
        let markers = MarkerFields::discover(&region).unwrap();
        assert_eq!(markers.group, "fiducial markers");
        assert_eq!(markers.name, "marker.name.old");
    }

    #[test]
    fn dotted_names_are_not_groups() {
        let region = make_region(vec![
            Field::stored_string("marker_name"),
            Field::stored_mesh_location("marker_location", 3),
            Field::group("marker.points"),
        ]);
        assert_eq!(
            MarkerFields::discover(&region),
            Err(SchemaError::MarkerFieldsNotFound {
                missing: vec!["group"]
            })
        );
    }

    #[test]
    fn wrong_marker_type_is_reported() {
        let region = make_region(vec![
            Field::group("marker"),
            Field::finite_element("marker_name", 1),
            Field::stored_mesh_location("marker_location", 3),
        ]);
        assert!(matches!(
            MarkerFields::discover(&region),
            Err(SchemaError::MarkerFieldType { expected: "stored string", .. })
        ));
    }

    #[test]
    fn resolve_reports_markers_before_coordinates() {
        let region = make_region(vec![]);
        assert!(matches!(
            FieldSchema::resolve(&region, None),
            Err(SchemaError::MarkerFieldsNotFound { .. })
        ));

        let region = make_region(marker_fields());
        assert_eq!(
            FieldSchema::resolve(&region, None),
            Err(SchemaError::CoordinatesNotFound)
        );

        let mut fields = marker_fields();
        fields.push(coordinates("coordinates", 3, &[1, 2, 3]));
        let schema = FieldSchema::resolve(&make_region(fields), None).unwrap();
        assert_eq!(schema.coordinates.name(), "coordinates");
    }
}
