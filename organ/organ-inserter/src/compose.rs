//! Tags an organ mesh with a group named after the organ.

use std::path::{Path, PathBuf};

use fe_mesh::SubelementHandling;
use fe_mesh_io::MeshSession;
use tracing::{info, warn};

use crate::error::InsertResult;

/// What [`compose_organ_group`] tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOutcome {
    /// Group and resource name.
    pub organ: String,
    /// File that was rewritten.
    pub path: PathBuf,
    /// Dimension of the tagged mesh, `None` if the file has no elements.
    pub dimension: Option<usize>,
    /// Number of top-dimension elements in the group.
    pub elements: usize,
}

/// Groups every element of the file's highest-dimension mesh under `organ`.
///
/// Full subelement handling is enabled, so faces, lines and nodes of the
/// tagged elements join the group too. An existing group of the same name is
/// emptied first. The file is overwritten with a single resource named
/// `organ`.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or saved, or `organ` names a
/// field that is not a group.
pub fn compose_organ_group(path: &Path, organ: &str) -> InsertResult<ComposeOutcome> {
    let mut session = MeshSession::open(path)?;
    let region = session.region_mut();

    let group = region.find_or_create_group(organ)?;
    group.clear();
    group.set_subelement_handling(SubelementHandling::Full);

    let dimension = region.highest_dimension_mesh().map(fe_mesh::Mesh::dimension);
    let elements = match dimension {
        Some(dimension) => region.add_elements_conditional(organ, dimension, |_| true)?,
        None => {
            warn!(path = %path.display(), organ, "Organ mesh has no elements, group left empty");
            0
        }
    };

    session.commit_resource(organ)?;
    info!(path = %path.display(), organ, ?dimension, elements, "Tagged organ group");

    Ok(ComposeOutcome {
        organ: organ.to_string(),
        path: path.to_path_buf(),
        dimension,
        elements,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fe_mesh::{Element, ElementShape, Field, Region};
    use fe_mesh_io::{load_document, save_region};
    use tempfile::tempdir;

    /// Two triangles sharing an edge, plus the shared edge as a line element.
    fn make_surface() -> Region {
        let mut region = Region::new();
        let mut coordinates = Field::coordinates("coordinates", 3);
        let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        for (node, p) in (1..).zip(points.iter()) {
            region.add_node(node).unwrap();
            coordinates.set_node_values(node, p).unwrap();
        }
        region.add_field(coordinates).unwrap();
        region
            .add_element(Element::new(1, ElementShape::Triangle3, vec![1, 2, 3]))
            .unwrap();
        region
            .add_element(Element::new(2, ElementShape::Triangle3, vec![2, 4, 3]))
            .unwrap();
        region
            .add_element(Element::new(1, ElementShape::Line2, vec![2, 3]))
            .unwrap();
        region
    }

    #[test]
    fn tags_highest_dimension_with_closure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heart_transformed_fit1.exf");
        save_region(&make_surface(), &path).unwrap();

        let outcome = compose_organ_group(&path, "heart").unwrap();
        assert_eq!(outcome.dimension, Some(2));
        assert_eq!(outcome.elements, 2);

        let document = load_document(&path).unwrap();
        assert_eq!(document.resource_names().collect::<Vec<_>>(), vec!["heart"]);
        let region = document.into_region().unwrap();
        let group = region.field("heart").unwrap().as_group().unwrap();
        assert_eq!(group.element_count(2), 2);
        assert!(group.contains_element(1, 1));
        assert_eq!(group.node_count(), 4);
        assert_eq!(group.subelement_handling(), SubelementHandling::Full);
    }

    #[test]
    fn rerun_replaces_membership() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lung.exf");
        save_region(&make_surface(), &path).unwrap();

        let first = compose_organ_group(&path, "lung").unwrap();
        let second = compose_organ_group(&path, "lung").unwrap();
        assert_eq!(first, second);

        let region = load_document(&path).unwrap().into_region().unwrap();
        let groups = region.fields().filter(|f| f.as_group().is_some()).count();
        assert_eq!(groups, 1);
    }

    #[test]
    fn empty_mesh_gets_empty_group() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.exf");
        let mut region = Region::new();
        region.add_node(1).unwrap();
        save_region(&region, &path).unwrap();

        let outcome = compose_organ_group(&path, "stomach").unwrap();
        assert_eq!(outcome.dimension, None);
        assert_eq!(outcome.elements, 0);
        let region = load_document(&path).unwrap().into_region().unwrap();
        assert!(region.field("stomach").unwrap().as_group().unwrap().is_empty());
    }

    #[test]
    fn non_group_field_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("colon.exf");
        save_region(&make_surface(), &path).unwrap();
        assert!(compose_organ_group(&path, "coordinates").is_err());
    }
}
