//! Similarity transform applied to coordinate fields.

use fe_mesh::{NodeId, Region};
use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::{RegistrationError, RegistrationResult};

/// A rigid transformation with optional uniform scale.
///
/// The transformation is applied in the order: scale -> rotate -> translate.
///
/// # Example
///
/// ```
/// use fe_registration::RigidTransform;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::FRAC_PI_2;
///
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
/// let transform = RigidTransform::new(rotation, Vector3::new(1.0, 0.0, 0.0));
///
/// let moved = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((moved - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
    /// Uniform scale factor (default 1.0).
    pub scale: f64,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a transform with the given rotation and translation and unit scale.
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
            scale: 1.0,
        }
    }

    /// Creates a transform with rotation, translation, and scale.
    #[must_use]
    pub const fn with_scale(
        rotation: UnitQuaternion<f64>,
        translation: Vector3<f64>,
        scale: f64,
    ) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(UnitQuaternion::identity(), Vector3::zeros())
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::identity(), translation)
    }

    /// Transforms a 3D point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * (point.coords * self.scale) + self.translation)
    }

    /// Composes this transform with another; the result applies `other` first.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * (other.translation * self.scale),
            scale: self.scale * other.scale,
        }
    }

    /// Computes the inverse of this transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_scale = 1.0 / self.scale;
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: inv_rotation * (-self.translation * inv_scale),
            scale: inv_scale,
        }
    }

    /// Returns true if this transform is approximately the identity.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.rotation.angle().abs() < epsilon
            && self.translation.norm() < epsilon
            && (self.scale - 1.0).abs() < epsilon
    }

    /// Transforms every node value of a 3-component finite-element field in place.
    ///
    /// Returns the number of nodes moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or is not a 3-component
    /// finite-element field.
    pub fn apply_to_field(&self, region: &mut Region, field: &str) -> RegistrationResult<usize> {
        let moved: Vec<(NodeId, Point3<f64>)> = node_positions(region, field)?
            .into_iter()
            .map(|(node, p)| (node, self.transform_point(&p)))
            .collect();

        let target = region
            .field_mut(field)
            .ok_or_else(|| RegistrationError::InvalidCoordinateField {
                name: field.to_string(),
            })?;
        for (node, p) in &moved {
            target.set_node_values(*node, &[p.x, p.y, p.z])?;
        }
        Ok(moved.len())
    }
}

/// Node positions stored by a 3-component finite-element field, in node order.
///
/// # Errors
///
/// Returns an error if the field is missing or is not a 3-component
/// finite-element field.
pub fn node_positions(region: &Region, field: &str) -> RegistrationResult<Vec<(NodeId, Point3<f64>)>> {
    let invalid = || RegistrationError::InvalidCoordinateField {
        name: field.to_string(),
    };
    let fe = region
        .field(field)
        .and_then(|f| f.as_finite_element())
        .filter(|fe| fe.components == 3)
        .ok_or_else(invalid)?;

    fe.node_values
        .iter()
        .map(|(&node, values)| match values.as_slice() {
            &[x, y, z] => Ok((node, Point3::new(x, y, z))),
            _ => Err(invalid()),
        })
        .collect()
}
