//! Penalized deformable fitting of node positions to data points.
//!
//! The unknowns are node displacements `d`. Each data point is tied to a
//! basis-weighted combination of node positions (its embedding). The fit
//! minimises
//!
//! ```text
//! w_d * sum_m |phi_m . (x + d) - t_m|^2  +  w_s * d^T L d  +  w_c * |L d|^2
//! ```
//!
//! where `L` is the graph Laplacian of node connectivity, `w_d` the data
//! weight, `w_s` the strain penalty and `w_c` the curvature penalty. The
//! normal equations are symmetric positive definite and are solved matrix-free
//! per coordinate component with Jacobi-preconditioned conjugate gradients.

use std::collections::BTreeSet;

use fe_mesh::{Location, NodeId, Region};
use hashbrown::HashMap;
use nalgebra::{DVector, Point3, Vector3};
use tracing::{debug, warn};

use crate::transform::node_positions;
use crate::{RegistrationError, RegistrationResult};

/// Parameters for the penalized fit.
#[derive(Debug, Clone)]
pub struct FitParams {
    /// Weight of the data term (default: 1000.0).
    pub data_weight: f64,
    /// Weight of the strain (membrane) penalty (default: 0.001).
    pub strain_penalty: f64,
    /// Weight of the curvature (bending) penalty (default: 200.0).
    pub curvature_penalty: f64,
    /// Maximum conjugate-gradient iterations per component (default: 5000).
    pub max_iterations: usize,
    /// Relative residual at which a component is converged (default: 1e-10).
    pub tolerance: f64,
    /// Diagonal shift keeping unconstrained nodes in place (default: 1e-9).
    pub regularization: f64,
    /// Fail instead of returning an unconverged result (default: false).
    pub require_convergence: bool,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            data_weight: 1000.0,
            strain_penalty: 0.001,
            curvature_penalty: 200.0,
            max_iterations: 5000,
            tolerance: 1e-10,
            regularization: 1e-9,
            require_convergence: false,
        }
    }
}

impl FitParams {
    /// Creates fit parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data weight.
    #[must_use]
    pub const fn with_data_weight(mut self, weight: f64) -> Self {
        self.data_weight = weight;
        self
    }

    /// Sets the strain penalty.
    #[must_use]
    pub const fn with_strain_penalty(mut self, weight: f64) -> Self {
        self.strain_penalty = weight;
        self
    }

    /// Sets the curvature penalty.
    #[must_use]
    pub const fn with_curvature_penalty(mut self, weight: f64) -> Self {
        self.curvature_penalty = weight;
        self
    }

    /// Sets the maximum iterations per component.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Requires the solver to converge.
    #[must_use]
    pub const fn with_require_convergence(mut self, required: bool) -> Self {
        self.require_convergence = required;
        self
    }

    fn validate(&self) -> RegistrationResult<()> {
        let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !(self.data_weight.is_finite() && self.data_weight > 0.0) {
            return Err(RegistrationError::InvalidParameter(format!(
                "data weight must be positive, got {}",
                self.data_weight
            )));
        }
        if !finite_non_negative(self.strain_penalty) || !finite_non_negative(self.curvature_penalty)
        {
            return Err(RegistrationError::InvalidParameter(
                "penalty weights must be non-negative".to_string(),
            ));
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(RegistrationError::InvalidParameter(
                "regularization must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RegistrationError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A data point and its embedding in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Node indices of the embedding.
    pub nodes: Vec<usize>,
    /// Basis weight of each node.
    pub weights: Vec<f64>,
    /// Where the embedded point should end up.
    pub target: Point3<f64>,
}

/// Nodes, their connectivity and the data points to fit.
#[derive(Debug, Clone, Default)]
pub struct FitProblem {
    node_ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    positions: Vec<Point3<f64>>,
    neighbours: Vec<BTreeSet<usize>>,
    points: Vec<DataPoint>,
}

impl FitProblem {
    /// Creates a problem over free-standing positions, identified 1, 2, ...
    #[must_use]
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        let node_ids = (1..).take(positions.len()).collect();
        Self::with_nodes(node_ids, positions)
    }

    fn with_nodes(node_ids: Vec<NodeId>, positions: Vec<Point3<f64>>) -> Self {
        let index = node_ids.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let neighbours = vec![BTreeSet::new(); positions.len()];
        Self {
            node_ids,
            index,
            positions,
            neighbours,
            points: Vec::new(),
        }
    }

    /// Builds a problem from the nodes carrying `coordinate_field` values.
    ///
    /// Nodes sharing an element of any dimension are connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a 3-component finite-element field.
    pub fn from_region(region: &Region, coordinate_field: &str) -> RegistrationResult<Self> {
        let (node_ids, positions): (Vec<NodeId>, Vec<Point3<f64>>) =
            node_positions(region, coordinate_field)?.into_iter().unzip();
        let mut problem = Self::with_nodes(node_ids, positions);
        for mesh in region.meshes() {
            for element in mesh.elements() {
                let local: Vec<usize> = element
                    .nodes
                    .iter()
                    .filter_map(|n| problem.index.get(n).copied())
                    .collect();
                for (k, &a) in local.iter().enumerate() {
                    for &b in &local[k + 1..] {
                        problem.connect(a, b);
                    }
                }
            }
        }
        Ok(problem)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of data points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Node identifiers in index order.
    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Connects two nodes. Self-connections and out-of-range indices are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b || a >= self.neighbours.len() || b >= self.neighbours.len() {
            return;
        }
        self.neighbours[a].insert(b);
        self.neighbours[b].insert(a);
    }

    /// Adds a data point with an explicit embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding is empty, its lengths differ, or it
    /// references a node outside the problem.
    pub fn add_point(&mut self, point: DataPoint) -> RegistrationResult<()> {
        if point.nodes.is_empty() || point.nodes.len() != point.weights.len() {
            return Err(RegistrationError::InvalidParameter(
                "embedding needs one weight per node".to_string(),
            ));
        }
        if let Some(&bad) = point.nodes.iter().find(|&&n| n >= self.positions.len()) {
            return Err(RegistrationError::InvalidParameter(format!(
                "embedding references node index {bad} of {}",
                self.positions.len()
            )));
        }
        self.points.push(point);
        Ok(())
    }

    /// Adds a data point embedded at a location of `region`.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is invalid in `region`, or one of its
    /// nodes carries no coordinates in this problem.
    pub fn add_point_at(
        &mut self,
        region: &Region,
        location: &Location,
        target: Point3<f64>,
    ) -> RegistrationResult<()> {
        let (nodes, weights): (Vec<NodeId>, Vec<f64>) = match *location {
            Location::Node(node) => (vec![node], vec![1.0]),
            Location::Element {
                dimension,
                element,
                xi,
            } => {
                let element = region.mesh(dimension)?.element(element).ok_or(
                    fe_mesh::MeshError::ElementNotFound {
                        id: element,
                        dimension,
                    },
                )?;
                if !element.shape.contains(xi) {
                    return Err(fe_mesh::MeshError::OutsideElement {
                        element: element.id,
                        xi,
                    }
                    .into());
                }
                (element.nodes.clone(), element.shape.basis(xi))
            }
        };
        let nodes = nodes
            .iter()
            .map(|n| {
                self.index.get(n).copied().ok_or_else(|| {
                    RegistrationError::InvalidParameter(format!("node {n} has no coordinates"))
                })
            })
            .collect::<RegistrationResult<Vec<_>>>()?;
        self.add_point(DataPoint {
            nodes,
            weights,
            target,
        })
    }

    fn embedded(&self, point: &DataPoint, displacement: Option<&[Vector3<f64>]>) -> Point3<f64> {
        let mut sum = Vector3::zeros();
        for (&n, &w) in point.nodes.iter().zip(&point.weights) {
            let mut p = self.positions[n].coords;
            if let Some(d) = displacement {
                p += d[n];
            }
            sum += p * w;
        }
        Point3::from(sum)
    }

    fn rms(&self, displacement: Option<&[Vector3<f64>]>) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .points
            .iter()
            .map(|p| (self.embedded(p, displacement) - p.target).norm_squared())
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let n = self.points.len() as f64;
        (sum / n).sqrt()
    }

    fn laplacian(&self, d: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            d.len(),
            self.neighbours.iter().enumerate().map(|(i, nbrs)| {
                #[allow(clippy::cast_precision_loss)]
                let degree = nbrs.len() as f64;
                degree * d[i] - nbrs.iter().map(|&j| d[j]).sum::<f64>()
            }),
        )
    }
}

/// Result of a penalized fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Displacement per node, in problem index order.
    pub displacements: Vec<Vector3<f64>>,
    /// Largest iteration count over the three components.
    pub iterations: usize,
    /// Whether every component converged.
    pub converged: bool,
    /// RMS data error before fitting.
    pub rms_before: f64,
    /// RMS data error after fitting.
    pub rms_after: f64,
}

impl FitResult {
    /// Writes displaced positions back into `coordinate_field` of `region`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be written.
    pub fn apply(
        &self,
        problem: &FitProblem,
        region: &mut Region,
        coordinate_field: &str,
    ) -> RegistrationResult<()> {
        let field = region.field_mut(coordinate_field).ok_or_else(|| {
            RegistrationError::InvalidCoordinateField {
                name: coordinate_field.to_string(),
            }
        })?;
        for ((&node, p), d) in problem
            .node_ids
            .iter()
            .zip(&problem.positions)
            .zip(&self.displacements)
        {
            let moved = p + d;
            field.set_node_values(node, &[moved.x, moved.y, moved.z])?;
        }
        Ok(())
    }
}

/// Penalized least-squares fitter.
///
/// # Example
///
/// ```
/// use fe_registration::{DataPoint, FitParams, FitProblem, PenalizedFit};
/// use nalgebra::Point3;
///
/// let mut problem = FitProblem::from_positions(vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
/// ]);
/// problem.connect(0, 1);
/// for (node, x) in [(0, 0.0), (1, 1.0)] {
///     problem
///         .add_point(DataPoint {
///             nodes: vec![node],
///             weights: vec![1.0],
///             target: Point3::new(x, 0.5, 0.0),
///         })
///         .unwrap();
/// }
///
/// let result = PenalizedFit::new(FitParams::default()).solve(&problem).unwrap();
/// assert!(result.rms_after < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PenalizedFit {
    params: FitParams,
}

impl PenalizedFit {
    /// Creates a fitter.
    #[must_use]
    pub const fn new(params: FitParams) -> Self {
        Self { params }
    }

    /// Fit parameters.
    #[must_use]
    pub const fn params(&self) -> &FitParams {
        &self.params
    }

    /// Solves for the node displacements.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid, the problem has no data
    /// points, or convergence is required and not reached.
    pub fn solve(&self, problem: &FitProblem) -> RegistrationResult<FitResult> {
        self.params.validate()?;
        if problem.points.is_empty() {
            return Err(RegistrationError::NoCorrespondences);
        }

        let n = problem.node_count();
        let p = &self.params;

        let mut diagonal = DVector::from_element(n, p.regularization);
        for point in &problem.points {
            for (&node, &w) in point.nodes.iter().zip(&point.weights) {
                diagonal[node] += p.data_weight * w * w;
            }
        }
        for (i, nbrs) in problem.neighbours.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let degree = nbrs.len() as f64;
            diagonal[i] +=
                p.strain_penalty * degree + p.curvature_penalty * (degree * degree + degree);
        }

        let mut displacements = vec![Vector3::zeros(); n];
        let mut iterations = 0;
        let mut converged = true;
        let mut worst_residual: f64 = 0.0;

        for component in 0..3 {
            let mut rhs = DVector::zeros(n);
            for point in &problem.points {
                let residual = point.target[component] - problem.embedded(point, None)[component];
                for (&node, &w) in point.nodes.iter().zip(&point.weights) {
                    rhs[node] += p.data_weight * w * residual;
                }
            }

            let outcome =
                conjugate_gradient(|v| self.apply_operator(problem, v), &rhs, &diagonal, p);
            for (d, value) in displacements.iter_mut().zip(outcome.solution.iter()) {
                d[component] = *value;
            }
            iterations = iterations.max(outcome.iterations);
            converged &= outcome.converged;
            worst_residual = worst_residual.max(outcome.residual);
        }

        if !converged {
            if p.require_convergence {
                return Err(RegistrationError::DidNotConverge {
                    iterations,
                    residual: worst_residual,
                });
            }
            warn!(iterations, residual = worst_residual, "Penalized fit did not converge");
        }

        let result = FitResult {
            rms_before: problem.rms(None),
            rms_after: problem.rms(Some(displacements.as_slice())),
            displacements,
            iterations,
            converged,
        };
        debug!(
            nodes = n,
            points = problem.points.len(),
            iterations,
            rms_before = result.rms_before,
            rms_after = result.rms_after,
            "Penalized fit finished"
        );
        Ok(result)
    }

    /// `(w_d Phi^T Phi + w_s L + w_c L L + eps I) v`
    fn apply_operator(&self, problem: &FitProblem, v: &DVector<f64>) -> DVector<f64> {
        let p = &self.params;
        let mut out = v * p.regularization;

        for point in &problem.points {
            let value: f64 = point
                .nodes
                .iter()
                .zip(&point.weights)
                .map(|(&n, &w)| w * v[n])
                .sum();
            for (&node, &w) in point.nodes.iter().zip(&point.weights) {
                out[node] += p.data_weight * w * value;
            }
        }

        let lv = problem.laplacian(v);
        if p.strain_penalty > 0.0 {
            out.axpy(p.strain_penalty, &lv, 1.0);
        }
        if p.curvature_penalty > 0.0 {
            out.axpy(p.curvature_penalty, &problem.laplacian(&lv), 1.0);
        }
        out
    }
}

struct CgOutcome {
    solution: DVector<f64>,
    iterations: usize,
    converged: bool,
    residual: f64,
}

fn conjugate_gradient<F>(
    apply: F,
    rhs: &DVector<f64>,
    diagonal: &DVector<f64>,
    params: &FitParams,
) -> CgOutcome
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut x = DVector::zeros(rhs.len());
    let rhs_norm = rhs.norm();
    if rhs_norm <= f64::MIN_POSITIVE {
        return CgOutcome {
            solution: x,
            iterations: 0,
            converged: true,
            residual: 0.0,
        };
    }

    let mut r = rhs.clone();
    let mut z = r.component_div(diagonal);
    let mut direction = z.clone();
    let mut rz = r.dot(&z);
    let mut relative = 1.0;

    for iteration in 1..=params.max_iterations {
        let ad = apply(&direction);
        let curvature = direction.dot(&ad);
        if curvature <= 0.0 {
            break;
        }
        let alpha = rz / curvature;
        x.axpy(alpha, &direction, 1.0);
        r.axpy(-alpha, &ad, 1.0);

        relative = r.norm() / rhs_norm;
        if relative <= params.tolerance {
            return CgOutcome {
                solution: x,
                iterations: iteration,
                converged: true,
                residual: relative,
            };
        }

        z = r.component_div(diagonal);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        rz = rz_next;
        direction = &z + direction * beta;
    }

    CgOutcome {
        solution: x,
        iterations: params.max_iterations,
        converged: false,
        residual: relative,
    }
}
