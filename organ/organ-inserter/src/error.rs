//! Error types for organ insertion.

use std::path::PathBuf;

use fe_mesh::MeshError;
use fe_mesh_io::IoError;
use fe_registration::RegistrationError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::markers::MarkerError;
use crate::schema::SchemaError;
use crate::step::StepError;

/// Result type for organ insertion.
pub type InsertResult<T> = Result<T, InsertError>;

/// Failure inside a [`Registrar`](crate::Registrar).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistrationFailure {
    /// The numerical alignment or fit failed.
    #[error(transparent)]
    Numerical(#[from] RegistrationError),

    /// The model's schema could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The marker set could not be read.
    #[error(transparent)]
    Markers(#[from] MarkerError),

    /// A model or output file could not be read or written.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Fit was requested for a model that was not aligned first.
    #[error("fit requested before align for {path}")]
    NotAligned {
        /// Model file.
        path: PathBuf,
    },

    /// Failure reported by another registrar implementation.
    #[error("{0}")]
    Message(String),
}

/// Errors that can abort an insertion run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InsertError {
    /// The scaffold schema could not be resolved.
    #[error("scaffold schema: {0}")]
    Schema(#[from] SchemaError),

    /// Marker extraction failed.
    #[error(transparent)]
    Marker(#[from] MarkerError),

    /// Registration of one organ failed.
    #[error("registration of '{organ}' failed: {source}")]
    Registration {
        /// Organ being registered.
        organ: String,
        /// Underlying failure.
        #[source]
        source: RegistrationFailure,
    },

    /// Reading or writing a mesh file failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Tagging a mesh failed.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// A file system operation failed.
    #[error("{action} {path}: {source}")]
    FileSystem {
        /// What was being done.
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The annotation manifest could not be written.
    #[error("manifest {path}: {source}")]
    Manifest {
        /// Manifest path.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The host step contract was violated.
    #[error(transparent)]
    Step(#[from] StepError),
}

impl InsertError {
    pub(crate) fn file_system(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            action,
            path: path.into(),
            source,
        }
    }
}
