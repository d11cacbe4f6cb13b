//! Error types for registration operations.

use fe_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur during registration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistrationError {
    /// Source point set is empty.
    #[error("source point set is empty")]
    EmptySource,

    /// Target point set is empty.
    #[error("target point set is empty")]
    EmptyTarget,

    /// Not enough landmarks provided for registration.
    #[error("at least {required} landmarks required, got {provided}")]
    InsufficientLandmarks {
        /// Number of landmarks required.
        required: usize,
        /// Number of landmarks provided.
        provided: usize,
    },

    /// SVD computation failed during transform estimation.
    #[error("SVD computation failed during transform estimation")]
    SvdFailed,

    /// The fit did not converge within the maximum iterations.
    #[error("fit did not converge after {iterations} iterations (residual: {residual:.6e})")]
    DidNotConverge {
        /// Number of iterations performed.
        iterations: usize,
        /// Final relative residual.
        residual: f64,
    },

    /// No data points to fit or align against.
    #[error("no correspondences between model and data")]
    NoCorrespondences,

    /// The named field cannot hold 3D positions.
    #[error("field '{name}' is not a 3-component finite-element field")]
    InvalidCoordinateField {
        /// Field name.
        name: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Reading or writing the region failed.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
