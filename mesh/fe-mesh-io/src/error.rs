//! Error types for mesh persistence.

use std::path::PathBuf;

use fe_mesh::MeshError;
use thiserror::Error;

/// Result type for mesh persistence operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur while loading or saving regions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Unknown file format (unrecognized extension).
    #[error("unknown file format: .{extension}")]
    UnknownFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// Invalid file content.
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// A node-only file was asked to hold elements.
    #[error("{path} is node-only but the region has {count} elements")]
    ElementsInNodeFile {
        /// Target path.
        path: PathBuf,
        /// Number of elements that would have been written.
        count: usize,
    },

    /// Document written by an incompatible version.
    #[error("unsupported document version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this crate reads and writes.
        supported: u32,
    },

    /// No resource with the requested name.
    #[error("no resource named '{name}'")]
    ResourceNotFound {
        /// Requested resource name.
        name: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The loaded region is inconsistent.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),
}

impl IoError {
    /// Create an `InvalidContent` error with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}
