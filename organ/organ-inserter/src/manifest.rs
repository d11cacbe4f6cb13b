//! Annotation manifest listing every file the run produced.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{InsertError, InsertResult};

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "organinserter_annotations.csv";

/// Column titles, in order.
pub const MANIFEST_HEADER: [&str; 4] = [
    "Organ name",
    "Source",
    "File name",
    "Transformed file name",
];

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRecord {
    /// Organ or scaffold label.
    pub organ: String,
    /// Provenance identifier; empty when unknown.
    pub source: String,
    /// Input file name.
    pub file_name: String,
    /// Produced file name.
    pub transformed_file_name: String,
}

impl AnnotationRecord {
    /// Creates a row from file paths, keeping only their file names.
    #[must_use]
    pub fn new(
        organ: impl Into<String>,
        source: Option<&str>,
        input: &Path,
        output: &Path,
    ) -> Self {
        Self {
            organ: organ.into(),
            source: source.unwrap_or_default().to_string(),
            file_name: file_name(input),
            transformed_file_name: file_name(output),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Path of the manifest inside `output_dir`.
#[must_use]
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILE_NAME)
}

/// Writes the header and `records` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`InsertError::Manifest`] if the file cannot be written.
pub fn write_manifest(path: &Path, records: &[AnnotationRecord]) -> InsertResult<()> {
    let wrap = |source: csv::Error| InsertError::Manifest {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(wrap)?;
    writer.write_record(MANIFEST_HEADER).map_err(wrap)?;
    for record in records {
        writer.serialize(record).map_err(wrap)?;
    }
    writer
        .flush()
        .map_err(|e| wrap(csv::Error::from(e)))?;
    debug!(path = %path.display(), rows = records.len(), "Wrote annotation manifest");
    Ok(())
}
