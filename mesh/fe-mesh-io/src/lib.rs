//! Persistence for finite-element regions.
//!
//! Regions are stored as versioned JSON documents holding one or more named
//! stream resources. The format is chosen from the file extension:
//!
//! - **`.exf`**, **`.ex2`**, **`.exelem`** - Full regions (nodes, elements, fields)
//! - **`.exnode`** - Node-only regions; saving elements to them is an error
//!
//! # Layer 0 Crate
//!
//! This crate only knows about [`fe_mesh::Region`]. It has no knowledge of
//! organs or registration.
//!
//! # Example
//!
//! ```no_run
//! use fe_mesh_io::{load_region, save_resource};
//!
//! let region = load_region("heart.exf").unwrap();
//! save_resource(&region, "heart", "heart_tagged.exf").unwrap();
//! ```
//!
//! # Sessions
//!
//! [`MeshSession`] owns one loaded region for the length of one operation and
//! writes it back on request:
//!
//! ```no_run
//! use fe_mesh_io::MeshSession;
//!
//! let mut session = MeshSession::open("heart.exf").unwrap();
//! session.region_mut().find_or_create_group("heart").unwrap();
//! session.commit_resource("heart").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod document;
mod error;
mod session;

pub use document::{DOCUMENT_VERSION, MeshDocument, Resource};
pub use error::{IoError, IoResult};
pub use session::MeshSession;

use std::fs;
use std::path::Path;

use fe_mesh::Region;
use tracing::debug;

/// Supported region file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// Full region: nodes, elements and fields.
    Ex,
    /// Nodes and node fields only.
    ExNode,
}

impl MeshFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "exf" | "ex2" | "exelem" => Some(Self::Ex),
            "exnode" => Some(Self::ExNode),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Ex => "exf",
            Self::ExNode => "exnode",
        }
    }

    /// Returns true if the format cannot hold elements.
    #[must_use]
    pub const fn is_node_only(&self) -> bool {
        matches!(self, Self::ExNode)
    }
}

fn detect_format(path: &Path) -> IoResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a document, checking its version and every region's consistency.
///
/// # Errors
///
/// Returns an error if:
/// - The format cannot be determined from the extension
/// - The file does not exist or cannot be read
/// - The content is not a valid document
/// - A node-only file contains elements
pub fn load_document<P: AsRef<Path>>(path: P) -> IoResult<MeshDocument> {
    let path = path.as_ref();
    let format = detect_format(path)?;
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let text = fs::read_to_string(path)?;
    let document: MeshDocument = serde_json::from_str(&text)?;
    document.validate()?;

    let count = document.element_count();
    if format.is_node_only() && count > 0 {
        return Err(IoError::ElementsInNodeFile {
            path: path.to_path_buf(),
            count,
        });
    }

    debug!(
        path = %path.display(),
        resources = document.resources.len(),
        "Loaded mesh document"
    );
    Ok(document)
}

/// Save a document, overwriting any existing file.
///
/// # Errors
///
/// Returns an error if the format cannot be determined, a node-only target
/// would receive elements, or the file cannot be written.
pub fn save_document<P: AsRef<Path>>(document: &MeshDocument, path: P) -> IoResult<()> {
    let path = path.as_ref();
    let format = detect_format(path)?;

    let count = document.element_count();
    if format.is_node_only() && count > 0 {
        return Err(IoError::ElementsInNodeFile {
            path: path.to_path_buf(),
            count,
        });
    }

    let text = serde_json::to_string_pretty(document)?;
    fs::write(path, text)?;

    debug!(
        path = %path.display(),
        resources = document.resources.len(),
        "Saved mesh document"
    );
    Ok(())
}

/// Load a region, merging every resource of the file in order.
///
/// # Errors
///
/// See [`load_document`]; also fails if resources conflict when merged.
pub fn load_region<P: AsRef<Path>>(path: P) -> IoResult<Region> {
    load_document(path)?.into_region()
}

/// Save a region as the single unnamed resource of a file.
///
/// # Errors
///
/// See [`save_document`].
pub fn save_region<P: AsRef<Path>>(region: &Region, path: P) -> IoResult<()> {
    let document = MeshDocument::new().with_resource(Resource::new(region.clone()));
    save_document(&document, path)
}

/// Save a region as the single resource named `name` of a file.
///
/// # Errors
///
/// See [`save_document`].
pub fn save_resource<P: AsRef<Path>>(region: &Region, name: &str, path: P) -> IoResult<()> {
    let document = MeshDocument::new().with_resource(Resource::named(name, region.clone()));
    save_document(&document, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fe_mesh::{Element, ElementShape, Field};
    use tempfile::tempdir;

    fn make_line() -> Region {
        let mut region = Region::new();
        let mut coordinates = Field::coordinates("coordinates", 3);
        for (id, x) in [(1, 0.0), (2, 1.0)] {
            region.add_node(id).unwrap();
            coordinates.set_node_values(id, &[x, 0.0, 0.0]).unwrap();
        }
        region.add_field(coordinates).unwrap();
        region
            .add_element(Element::new(1, ElementShape::Line2, vec![1, 2]))
            .unwrap();
        region
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(MeshFormat::from_path("a.exf"), Some(MeshFormat::Ex));
        assert_eq!(MeshFormat::from_path("a.EX2"), Some(MeshFormat::Ex));
        assert_eq!(MeshFormat::from_path("a.exelem"), Some(MeshFormat::Ex));
        assert_eq!(MeshFormat::from_path("a.exnode"), Some(MeshFormat::ExNode));
        assert_eq!(MeshFormat::from_path("a.stl"), None);
        assert_eq!(MeshFormat::from_path("noext"), None);
        assert!(MeshFormat::ExNode.is_node_only());
        assert_eq!(MeshFormat::Ex.extension(), "exf");
    }

    #[test]
    fn test_save_and_load_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("line.exf");
        let region = make_line();

        save_region(&region, &path).unwrap();
        let loaded = load_region(&path).unwrap();
        assert_eq!(loaded, region);
    }

    #[test]
    fn test_save_resource_names_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("line.exf");

        save_resource(&make_line(), "heart", &path).unwrap();
        let document = load_document(&path).unwrap();
        assert_eq!(document.resource_names().collect::<Vec<_>>(), ["heart"]);
        assert_eq!(load_region(&path).unwrap().name(), Some("heart"));
    }

    #[test]
    fn test_node_only_rejects_elements() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("line.exnode");
        let result = save_region(&make_line(), &path);
        assert!(matches!(
            result,
            Err(IoError::ElementsInNodeFile { count: 1, .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_region(dir.path().join("absent.exf"));
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }

    #[test]
    fn test_unknown_format() {
        let result = save_region(&Region::new(), "model.obj");
        assert!(matches!(result, Err(IoError::UnknownFormat { extension }) if extension == "obj"));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.exf");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_region(&path), Err(IoError::Json(_))));
    }
}
