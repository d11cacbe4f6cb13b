//! Registration of finite-element regions against landmark data.
//!
//! This crate provides the numerical side of bringing a model region into a
//! landmark frame:
//! - **Kabsch/Umeyama** - Best similarity transform between paired points
//! - **Named landmarks** - Pairing model and data landmarks by name, then aligning
//! - **Penalized fit** - Deformable fit of node positions to embedded data points,
//!   regularised by strain and curvature penalties
//!
//! # Layer 0
//!
//! This is a Layer 0 crate. It knows about [`fe_mesh::Region`] but nothing
//! about organs or scaffolds.
//!
//! # Quick Start
//!
//! ```
//! use fe_registration::{align_named_points, LandmarkParams, NamedPoint};
//! use nalgebra::Point3;
//!
//! let model = vec![
//!     NamedPoint::new("a", Point3::new(0.0, 0.0, 0.0)),
//!     NamedPoint::new("b", Point3::new(1.0, 0.0, 0.0)),
//!     NamedPoint::new("c", Point3::new(0.0, 1.0, 0.0)),
//! ];
//! let data = vec![
//!     NamedPoint::new("c", Point3::new(5.0, 6.0, 0.0)),
//!     NamedPoint::new("a", Point3::new(5.0, 5.0, 0.0)),
//!     NamedPoint::new("b", Point3::new(6.0, 5.0, 0.0)),
//! ];
//!
//! let result = align_named_points(&model, &data, &LandmarkParams::default()).unwrap();
//! assert!(result.rms_error < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod fit;
mod kabsch;
mod landmark;
mod transform;

pub use error::{RegistrationError, RegistrationResult};
pub use fit::{DataPoint, FitParams, FitProblem, FitResult, PenalizedFit};
pub use kabsch::{compute_rigid_transform, compute_weighted_rigid_transform, rms_error};
pub use landmark::{
    AlignResult, LandmarkParams, MIN_LANDMARKS, NamedPoint, Pairing, align_named_points,
    pair_by_name,
};
pub use transform::{RigidTransform, node_positions};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
