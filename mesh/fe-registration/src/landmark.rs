//! Alignment from named landmarks.
//!
//! Model and data landmarks are paired by exact name, then the best
//! similarity transform between the pairs is estimated.

use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::debug;

use crate::kabsch::{compute_rigid_transform, rms_error};
use crate::{RegistrationError, RegistrationResult, RigidTransform};

/// Minimum number of paired landmarks for a unique alignment.
pub const MIN_LANDMARKS: usize = 3;

/// A landmark position with a name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPoint {
    /// Landmark name.
    pub name: String,
    /// Landmark position.
    pub position: Point3<f64>,
}

impl NamedPoint {
    /// Creates a named point.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// The outcome of pairing model landmarks to data landmarks by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// `(model index, data index)` pairs in model order.
    pub pairs: Vec<(usize, usize)>,
    /// Model names with no data landmark.
    pub unmatched_model: Vec<String>,
    /// Data names no model landmark asked for.
    pub unmatched_data: Vec<String>,
}

/// Pairs model landmarks to data landmarks with the same name.
///
/// When the data holds a name more than once, its first occurrence is used.
#[must_use]
pub fn pair_by_name(model: &[NamedPoint], data: &[NamedPoint]) -> Pairing {
    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(data.len());
    for (index, point) in data.iter().enumerate() {
        by_name.entry(point.name.as_str()).or_insert(index);
    }

    let mut pairing = Pairing::default();
    let mut used = vec![false; data.len()];
    for (model_index, point) in model.iter().enumerate() {
        match by_name.get(point.name.as_str()) {
            Some(&data_index) => {
                pairing.pairs.push((model_index, data_index));
                used[data_index] = true;
            }
            None => pairing.unmatched_model.push(point.name.clone()),
        }
    }
    pairing.unmatched_data = data
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(p, _)| p.name.clone())
        .collect();
    pairing
}

/// Parameters for landmark alignment.
#[derive(Debug, Clone, Default)]
pub struct LandmarkParams {
    /// Whether to estimate uniform scale (default: false).
    pub compute_scale: bool,
}

impl LandmarkParams {
    /// Creates new landmark parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables scale estimation.
    #[must_use]
    pub const fn with_scale(mut self, compute_scale: bool) -> Self {
        self.compute_scale = compute_scale;
        self
    }
}

/// Result of landmark alignment.
#[derive(Debug, Clone)]
pub struct AlignResult {
    /// Transform taking model landmarks onto data landmarks.
    pub transform: RigidTransform,
    /// RMS distance between transformed model landmarks and data landmarks.
    pub rms_error: f64,
    /// Pairing used for the estimate.
    pub pairing: Pairing,
}

/// Aligns named model landmarks to named data landmarks.
///
/// # Errors
///
/// Returns [`RegistrationError::InsufficientLandmarks`] if fewer than
/// [`MIN_LANDMARKS`] names pair up, or an estimation error.
///
/// # Example
///
/// ```
/// use fe_registration::{align_named_points, LandmarkParams, NamedPoint};
/// use nalgebra::Point3;
///
/// let model = vec![
///     NamedPoint::new("apex", Point3::new(0.0, 0.0, 0.0)),
///     NamedPoint::new("base", Point3::new(1.0, 0.0, 0.0)),
///     NamedPoint::new("left", Point3::new(0.0, 1.0, 0.0)),
/// ];
/// let data: Vec<_> = model
///     .iter()
///     .map(|p| NamedPoint::new(p.name.clone(), p.position + nalgebra::Vector3::x() * 4.0))
///     .collect();
///
/// let result = align_named_points(&model, &data, &LandmarkParams::default()).unwrap();
/// assert!(result.rms_error < 1e-9);
/// ```
pub fn align_named_points(
    model: &[NamedPoint],
    data: &[NamedPoint],
    params: &LandmarkParams,
) -> RegistrationResult<AlignResult> {
    let pairing = pair_by_name(model, data);
    if pairing.pairs.len() < MIN_LANDMARKS {
        return Err(RegistrationError::InsufficientLandmarks {
            required: MIN_LANDMARKS,
            provided: pairing.pairs.len(),
        });
    }

    let (source, target): (Vec<Point3<f64>>, Vec<Point3<f64>>) = pairing
        .pairs
        .iter()
        .map(|&(m, d)| (model[m].position, data[d].position))
        .unzip();

    let transform = compute_rigid_transform(&source, &target, params.compute_scale)?;
    let rms_error = rms_error(&transform, &source, &target);

    debug!(
        pairs = pairing.pairs.len(),
        unmatched_model = pairing.unmatched_model.len(),
        unmatched_data = pairing.unmatched_data.len(),
        rms_error,
        scale = transform.scale,
        "Aligned named landmarks"
    );

    Ok(AlignResult {
        transform,
        rms_error,
        pairing,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn named(points: &[(&str, f64, f64, f64)]) -> Vec<NamedPoint> {
        points
            .iter()
            .map(|&(n, x, y, z)| NamedPoint::new(n, Point3::new(x, y, z)))
            .collect()
    }

    #[test]
    fn test_pairing_reports_unmatched() {
        let model = named(&[("a", 0.0, 0.0, 0.0), ("b", 1.0, 0.0, 0.0), ("x", 2.0, 0.0, 0.0)]);
        let data = named(&[("b", 0.0, 0.0, 0.0), ("a", 1.0, 0.0, 0.0), ("y", 2.0, 0.0, 0.0)]);

        let pairing = pair_by_name(&model, &data);
        assert_eq!(pairing.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(pairing.unmatched_model, vec!["x".to_string()]);
        assert_eq!(pairing.unmatched_data, vec!["y".to_string()]);
    }

    #[test]
    fn test_duplicate_data_name_keeps_first() {
        let model = named(&[("a", 0.0, 0.0, 0.0)]);
        let data = named(&[("a", 1.0, 0.0, 0.0), ("a", 9.0, 0.0, 0.0)]);
        let pairing = pair_by_name(&model, &data);
        assert_eq!(pairing.pairs, vec![(0, 0)]);
        assert_eq!(pairing.unmatched_data, vec!["a".to_string()]);
    }

    #[test]
    fn test_align_with_scale() {
        let model = named(&[
            ("a", 0.0, 0.0, 0.0),
            ("b", 1.0, 0.0, 0.0),
            ("c", 0.0, 1.0, 0.0),
            ("d", 0.0, 0.0, 1.0),
        ]);
        let data: Vec<_> = model
            .iter()
            .map(|p| {
                let moved = p.position.coords * 2.0 + Vector3::new(1.0, 1.0, 1.0);
                NamedPoint::new(p.name.clone(), Point3::from(moved))
            })
            .collect();

        let params = LandmarkParams::new().with_scale(true);
        let result = align_named_points(&model, &data, &params).unwrap();
        assert_relative_eq!(result.transform.scale, 2.0, epsilon = 1e-9);
        assert!(result.rms_error < 1e-9);
    }

    #[test]
    fn test_too_few_pairs() {
        let model = named(&[("a", 0.0, 0.0, 0.0), ("b", 1.0, 0.0, 0.0), ("c", 0.0, 1.0, 0.0)]);
        let data = named(&[("a", 0.0, 0.0, 0.0), ("b", 1.0, 0.0, 0.0), ("z", 0.0, 1.0, 0.0)]);
        let result = align_named_points(&model, &data, &LandmarkParams::default());
        assert!(matches!(
            result,
            Err(RegistrationError::InsufficientLandmarks { required: 3, provided: 2 })
        ));
    }
}
