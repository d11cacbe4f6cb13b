//! Marker coordinate extraction.
//!
//! Scaffold markers are stored as mesh locations. Extraction evaluates the
//! coordinate field at each location and produces a free-standing, named
//! point cloud that registration can use as data.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fe_mesh::{Field, Location, MeshError, NodeId, Region};
use fe_mesh_io::{IoError, load_region, save_region};
use fe_registration::NamedPoint;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::base_name;
use crate::schema::FieldSchema;

/// Coordinate field of an extracted marker set.
pub const MARKER_COORDINATES_FIELD: &str = "marker_data_coordinates";
/// Name field of an extracted marker set.
pub const MARKER_NAME_FIELD: &str = "marker_data_name";
/// Group holding the nodes of an extracted marker set.
pub const MARKER_GROUP: &str = "marker";
/// Suffix and extension of the marker set file.
pub const MARKER_FILE_SUFFIX: &str = "_marker_coordinates.exnode";

/// Errors from marker extraction and marker set files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarkerError {
    /// A marker could not be evaluated.
    #[error("marker node {node} could not be evaluated: {source}")]
    EvaluationFailed {
        /// Scaffold node of the marker.
        node: NodeId,
        /// Underlying evaluation error.
        #[source]
        source: MeshError,
    },

    /// A marker set file lacks a required field.
    #[error("marker file {path} has no '{field}' field")]
    MissingField {
        /// File that was read.
        path: PathBuf,
        /// Missing field.
        field: &'static str,
    },

    /// Building the marker region failed.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// Reading or writing the marker file failed.
    #[error("marker file: {0}")]
    Io(#[from] IoError),
}

/// What to do when a single marker cannot be evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPolicy {
    /// Log a warning and leave the marker out.
    #[default]
    Skip,
    /// Abort extraction.
    Fail,
}

impl fmt::Display for MarkerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Fail => "fail",
        })
    }
}

impl FromStr for MarkerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown marker policy '{other}' (expected skip or fail)")),
        }
    }
}

/// One extracted marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPoint {
    /// Identifier of the scaffold node the marker came from.
    pub node: NodeId,
    /// Marker name.
    pub name: String,
    /// Marker position in scaffold coordinates.
    pub position: Point3<f64>,
}

/// A named point cloud of markers, in node order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    points: Vec<MarkerPoint>,
    skipped: Vec<NodeId>,
}

impl MarkerSet {
    /// Extracts every node of the marker group of `region`.
    ///
    /// The position is the coordinate field evaluated at the node's stored
    /// marker location; the name is the marker name field at the node.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::EvaluationFailed`] under [`MarkerPolicy::Fail`]
    /// when a marker cannot be evaluated.
    pub fn extract(
        region: &Region,
        schema: &FieldSchema,
        policy: MarkerPolicy,
    ) -> Result<Self, MarkerError> {
        let group = region
            .require_field(&schema.markers.group)?
            .as_group()
            .ok_or_else(|| MeshError::WrongFieldType {
                name: schema.markers.group.clone(),
                expected: "group",
            })?;

        let mut set = Self::default();
        for node in group.nodes() {
            let evaluated = region
                .evaluate_embedded(schema.coordinates.name(), &schema.markers.location, node)
                .and_then(|x| {
                    let name = region.evaluate_string(&schema.markers.name, node)?;
                    Ok((x, name.to_string()))
                });

            match evaluated {
                Ok((x, name)) => set.points.push(MarkerPoint {
                    node,
                    name,
                    position: Point3::new(x[0], x[1], x[2]),
                }),
                Err(source) if policy == MarkerPolicy::Fail => {
                    return Err(MarkerError::EvaluationFailed { node, source });
                }
                Err(source) => {
                    warn!(node, error = %source, "Skipping marker that could not be evaluated");
                    set.skipped.push(node);
                }
            }
        }

        info!(
            markers = set.points.len(),
            skipped = set.skipped.len(),
            "Extracted marker coordinates"
        );
        Ok(set)
    }

    /// Builds a marker set from points.
    #[must_use]
    pub fn from_points(points: Vec<MarkerPoint>) -> Self {
        Self {
            points,
            skipped: Vec::new(),
        }
    }

    /// Extracted markers.
    #[must_use]
    pub fn points(&self) -> &[MarkerPoint] {
        &self.points
    }

    /// Marker nodes left out under [`MarkerPolicy::Skip`].
    #[must_use]
    pub fn skipped(&self) -> &[NodeId] {
        &self.skipped
    }

    /// Number of markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if there are no markers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Markers as named points for alignment.
    #[must_use]
    pub fn named_points(&self) -> Vec<NamedPoint> {
        self.points
            .iter()
            .map(|p| NamedPoint::new(p.name.clone(), p.position))
            .collect()
    }

    /// A node-only region holding the markers.
    ///
    /// Node identifiers are the scaffold node identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if two markers share a node identifier.
    pub fn to_region(&self) -> Result<Region, MarkerError> {
        let mut region = Region::new();
        let mut coordinates = Field::coordinates(MARKER_COORDINATES_FIELD, 3);
        let mut names = Field::stored_string(MARKER_NAME_FIELD);
        let mut group = Field::group(MARKER_GROUP);

        for point in &self.points {
            region.add_node(point.node)?;
            let p = point.position;
            coordinates.set_node_values(point.node, &[p.x, p.y, p.z])?;
            names.set_node_string(point.node, point.name.as_str())?;
            if let Some(g) = group.as_group_mut() {
                g.add_node(point.node);
            }
        }

        region.add_field(coordinates)?;
        region.add_field(names)?;
        region.add_field(group)?;
        Ok(region)
    }

    /// Writes the marker set to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be built or written.
    pub fn save(&self, path: &Path) -> Result<(), MarkerError> {
        save_region(&self.to_region()?, path)?;
        debug!(path = %path.display(), markers = self.points.len(), "Saved marker set");
        Ok(())
    }

    /// Reads a marker set written by [`MarkerSet::save`].
    ///
    /// Nodes of the marker group (or every node if the file has no group)
    /// with both a position and a name become markers.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks the coordinate
    /// or name field.
    pub fn load(path: &Path) -> Result<Self, MarkerError> {
        let region = load_region(path)?;
        for field in [MARKER_COORDINATES_FIELD, MARKER_NAME_FIELD] {
            if region.field(field).is_none() {
                return Err(MarkerError::MissingField {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }

        let nodes: Vec<NodeId> = match region.field(MARKER_GROUP).and_then(Field::as_group) {
            Some(group) => group.nodes().collect(),
            None => region.node_ids().collect(),
        };

        let mut set = Self::default();
        for node in nodes {
            let position = region.evaluate_real(MARKER_COORDINATES_FIELD, &Location::node(node));
            let name = region.evaluate_string(MARKER_NAME_FIELD, node);
            match (position, name) {
                (Ok(x), Ok(name)) if x.len() == 3 => set.points.push(MarkerPoint {
                    node,
                    name: name.to_string(),
                    position: Point3::new(x[0], x[1], x[2]),
                }),
                _ => set.skipped.push(node),
            }
        }
        Ok(set)
    }

    /// Marker file path for a scaffold: `<output_dir>/<base>_marker_coordinates.exnode`.
    #[must_use]
    pub fn file_path(scaffold: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}{MARKER_FILE_SUFFIX}", base_name(scaffold)))
    }
}
