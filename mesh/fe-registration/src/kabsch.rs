//! Kabsch/Umeyama estimation of the best similarity transform between paired points.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

use crate::{RegistrationError, RegistrationResult, RigidTransform};

/// Computes the transform that best maps `source_points` onto `target_points`.
///
/// Uses the SVD of the cross-covariance matrix, with a reflection guard so
/// the result is always a proper rotation. When `compute_scale` is set the
/// optimal uniform scale is estimated too.
///
/// # Errors
///
/// Returns an error if:
/// - Either point set is empty
/// - The point sets have different lengths
/// - SVD computation fails
///
/// # Example
///
/// ```
/// use fe_registration::compute_rigid_transform;
/// use nalgebra::Point3;
///
/// let source = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let target: Vec<_> = source
///     .iter()
///     .map(|p| Point3::new(p.x + 1.0, p.y + 2.0, p.z + 3.0))
///     .collect();
///
/// let transform = compute_rigid_transform(&source, &target, false).unwrap();
/// assert!((transform.transform_point(&source[0]) - target[0]).norm() < 1e-9);
/// ```
pub fn compute_rigid_transform(
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
    compute_scale: bool,
) -> RegistrationResult<RigidTransform> {
    let weights = vec![1.0; source_points.len()];
    compute_weighted_rigid_transform(source_points, target_points, &weights, compute_scale)
}

/// Computes the best transform with a weight per correspondence.
///
/// # Errors
///
/// Returns an error if:
/// - Either point set is empty
/// - The point sets and weights have different lengths
/// - The total weight is not positive
/// - SVD computation fails
pub fn compute_weighted_rigid_transform(
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
    weights: &[f64],
    compute_scale: bool,
) -> RegistrationResult<RigidTransform> {
    if source_points.is_empty() {
        return Err(RegistrationError::EmptySource);
    }
    if target_points.is_empty() {
        return Err(RegistrationError::EmptyTarget);
    }
    if source_points.len() != target_points.len() || source_points.len() != weights.len() {
        return Err(RegistrationError::InvalidParameter(format!(
            "point sets and weights must have equal length: {} / {} / {}",
            source_points.len(),
            target_points.len(),
            weights.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(RegistrationError::InvalidParameter(
            "total weight must be positive".to_string(),
        ));
    }

    let source_centroid = weighted_centroid(source_points, weights, total);
    let target_centroid = weighted_centroid(target_points, weights, total);

    let mut covariance = Matrix3::zeros();
    let mut source_variance = 0.0;
    for ((s, t), &w) in source_points.iter().zip(target_points).zip(weights) {
        let s = s.coords - source_centroid;
        let t = t.coords - target_centroid;
        covariance += w * s * t.transpose();
        source_variance += w * s.norm_squared();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;

    let mut v = v_t.transpose();
    let mut rotation_matrix = v * u.transpose();
    let mut singular = svd.singular_values;
    if rotation_matrix.determinant() < 0.0 {
        // Reflection: flip the axis of the smallest singular value.
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        singular[2] = -singular[2];
        rotation_matrix = v * u.transpose();
    }
    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));

    let scale = if compute_scale && source_variance > 1e-12 {
        singular.sum() / source_variance
    } else {
        1.0
    };

    let translation = target_centroid - scale * (rotation * source_centroid);
    Ok(RigidTransform::with_scale(rotation, translation, scale))
}

/// Root mean square distance between transformed source points and targets.
#[must_use]
pub fn rms_error(
    transform: &RigidTransform,
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
) -> f64 {
    if source_points.is_empty() {
        return 0.0;
    }
    let sum: f64 = source_points
        .iter()
        .zip(target_points)
        .map(|(s, t)| (transform.transform_point(s) - t).norm_squared())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = source_points.len() as f64;
    (sum / n).sqrt()
}

fn weighted_centroid(points: &[Point3<f64>], weights: &[f64], total: f64) -> Vector3<f64> {
    let sum: Vector3<f64> = points.iter().zip(weights).map(|(p, &w)| p.coords * w).sum();
    sum / total
}
