//! Scoped ownership of one loaded region.

use std::path::{Path, PathBuf};

use fe_mesh::Region;
use tracing::debug;

use crate::{IoResult, load_region, save_resource};

/// One region loaded from a file for the length of one operation.
///
/// The session owns its region outright; nothing is shared with other
/// sessions. Dropping the session releases the region on every exit path,
/// including early returns on error.
#[derive(Debug)]
pub struct MeshSession {
    path: PathBuf,
    region: Region,
}

impl MeshSession {
    /// Loads the region stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn open<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let region = load_region(&path)?;
        debug!(path = %path.display(), nodes = region.node_count(), "Opened mesh session");
        Ok(Self { path, region })
    }

    /// File the region was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded region.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The loaded region, for modification.
    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Overwrites the source file with the region as a single resource named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn commit_resource(&self, name: &str) -> IoResult<()> {
        save_resource(&self.region, name, &self.path)
    }
}

impl Drop for MeshSession {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Released mesh session");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{load_document, save_region};
    use tempfile::tempdir;

    #[test]
    fn commit_overwrites_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("organ.exf");
        let mut region = Region::new();
        region.add_node(1).unwrap();
        save_region(&region, &path).unwrap();

        let mut session = MeshSession::open(&path).unwrap();
        assert_eq!(session.path(), path.as_path());
        session.region_mut().find_or_create_group("lung").unwrap().add_node(1);
        session.commit_resource("lung").unwrap();
        drop(session);

        let document = load_document(&path).unwrap();
        assert_eq!(document.resources.len(), 1);
        let stored = &document.resources[0];
        assert_eq!(stored.name.as_deref(), Some("lung"));
        assert!(stored.region.field("lung").is_some());
    }
}
