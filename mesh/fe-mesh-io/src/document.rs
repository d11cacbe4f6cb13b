//! The on-disk document: a version tag and a list of stream resources.

use fe_mesh::Region;
use serde::{Deserialize, Serialize};

use crate::{IoError, IoResult};

/// Document version written by this crate.
pub const DOCUMENT_VERSION: u32 = 1;

/// A named sub-unit of a document holding one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The region stored in this resource.
    pub region: Region,
}

impl Resource {
    /// Creates an unnamed resource.
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self { name: None, region }
    }

    /// Creates a named resource.
    #[must_use]
    pub fn named(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: Some(name.into()),
            region,
        }
    }
}

/// A persisted mesh document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDocument {
    /// Document format version.
    pub version: u32,
    /// Stream resources in file order.
    pub resources: Vec<Resource>,
}

impl Default for MeshDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshDocument {
    /// Creates an empty document at the current version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            resources: Vec::new(),
        }
    }

    /// Appends a resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
    }

    /// Resource names in file order, skipping unnamed resources.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.resources.iter().filter_map(|r| r.name.as_deref())
    }

    /// Total number of elements across all resources.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.resources.iter().map(|r| r.region.element_count()).sum()
    }

    /// Checks the version and every region's consistency.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnsupportedVersion`] or the first region error.
    pub fn validate(&self) -> IoResult<()> {
        if self.version != DOCUMENT_VERSION {
            return Err(IoError::UnsupportedVersion {
                found: self.version,
                supported: DOCUMENT_VERSION,
            });
        }
        for resource in &self.resources {
            resource.region.validate()?;
        }
        Ok(())
    }

    /// Merges every resource, in order, into one region.
    ///
    /// The first resource name becomes the region name when the merged
    /// regions carry none.
    ///
    /// # Errors
    ///
    /// Returns an error if resources conflict.
    pub fn into_region(self) -> IoResult<Region> {
        let mut merged = Region::new();
        for resource in self.resources {
            let mut region = resource.region;
            if let Some(name) = resource.name.filter(|_| region.name().is_none()) {
                region.set_name(name);
            }
            merged.merge(region)?;
        }
        Ok(merged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn into_region_merges_in_order() {
        let mut a = Region::new();
        a.add_node(1).unwrap();
        let mut b = Region::new();
        b.add_node(2).unwrap();

        let doc = MeshDocument::new()
            .with_resource(Resource::named("left", a))
            .with_resource(Resource::named("right", b));
        assert_eq!(doc.resource_names().collect::<Vec<_>>(), ["left", "right"]);

        let region = doc.into_region().unwrap();
        assert_eq!(region.node_count(), 2);
        assert_eq!(region.name(), Some("left"));
    }

    #[test]
    fn validate_rejects_future_version() {
        let mut doc = MeshDocument::new();
        doc.version = DOCUMENT_VERSION + 1;
        assert!(matches!(
            doc.validate(),
            Err(IoError::UnsupportedVersion { .. })
        ));
    }
}
