//! Registration pipeline contract and the default landmark registrar.
//!
//! A [`Registrar`] aligns one organ model to the marker set, then fits it.
//! Output files are found by name, so every implementation writes to the
//! paths a [`RegistrationJob`] derives.

use std::path::{Path, PathBuf};

use fe_mesh::{Field, Location, Region};
use fe_mesh_io::{load_region, save_region};
use fe_registration::{
    FitParams, FitProblem, LandmarkParams, NamedPoint, PenalizedFit, align_named_points,
    pair_by_name,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::base_name;
use crate::error::RegistrationFailure;
use crate::markers::MarkerSet;
use crate::schema::{CoordinateField, MarkerFields};

/// Coordinate field name preferred in organ models.
pub const MODEL_COORDINATES: &str = "coordinates";

/// Weights of the deformable fit, applied to the whole mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitWeights {
    /// Weight of the marker data term.
    pub data_weight: f64,
    /// Strain penalty.
    pub strain_penalty: f64,
    /// Curvature penalty.
    pub curvature_penalty: f64,
}

impl Default for FitWeights {
    fn default() -> Self {
        Self {
            data_weight: 1000.0,
            strain_penalty: 0.001,
            curvature_penalty: 200.0,
        }
    }
}

/// One organ model to register, with the output paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationJob {
    model: PathBuf,
    markers: PathBuf,
    stem: PathBuf,
    extension: String,
}

impl RegistrationJob {
    /// Creates a job writing under `output_dir`.
    ///
    /// The stem is `<output_dir>/<model base name>_transformed`; outputs keep
    /// the model's extension, or `exf` if it has none.
    #[must_use]
    pub fn new(model: impl Into<PathBuf>, markers: impl Into<PathBuf>, output_dir: &Path) -> Self {
        let model = model.into();
        let stem = output_dir.join(format!("{}_transformed", base_name(&model)));
        let extension = model
            .extension()
            .map_or_else(|| "exf".to_string(), |e| e.to_string_lossy().into_owned());
        Self {
            model,
            markers: markers.into(),
            stem,
            extension,
        }
    }

    /// Organ model file.
    #[must_use]
    pub fn model(&self) -> &Path {
        &self.model
    }

    /// Marker set file.
    #[must_use]
    pub fn markers(&self) -> &Path {
        &self.markers
    }

    /// Output stem, without suffix or extension.
    #[must_use]
    pub fn stem(&self) -> &Path {
        &self.stem
    }

    /// Where the aligned model is written: `<stem>_align.<ext>`.
    #[must_use]
    pub fn aligned_path(&self) -> PathBuf {
        self.with_suffix("_align")
    }

    /// Where the fitted model is written: `<stem>_fit1.<ext>`.
    #[must_use]
    pub fn fitted_path(&self) -> PathBuf {
        self.with_suffix("_fit1")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.stem.as_os_str().to_os_string();
        name.push(format!("{suffix}.{}", self.extension));
        PathBuf::from(name)
    }
}

/// Rigid alignment followed by deformable fitting of one organ model.
///
/// Implementations are called for one organ at a time and need not be
/// re-entrant.
pub trait Registrar {
    /// Aligns the model to the marker set and writes [`RegistrationJob::aligned_path`].
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationFailure`] if alignment fails.
    fn align(&mut self, job: &RegistrationJob) -> Result<PathBuf, RegistrationFailure>;

    /// Fits the aligned model and writes [`RegistrationJob::fitted_path`].
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationFailure`] if the model was not aligned or the
    /// fit fails.
    fn fit(
        &mut self,
        job: &RegistrationJob,
        weights: &FitWeights,
    ) -> Result<PathBuf, RegistrationFailure>;
}

/// Landmark-driven registrar.
///
/// Model markers are paired to the marker set by name. Alignment estimates
/// a similarity transform from the pairs; the fit then pulls each model
/// marker's embedded location towards its data point under strain and
/// curvature penalties.
#[derive(Debug, Clone, Default)]
pub struct LandmarkRegistrar {
    coordinate_field: Option<String>,
    max_iterations: Option<usize>,
    aligned: Option<PathBuf>,
}

impl LandmarkRegistrar {
    /// Creates a registrar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the named model coordinate field instead of discovering one.
    #[must_use]
    pub fn with_coordinate_field(mut self, name: impl Into<String>) -> Self {
        self.coordinate_field = Some(name.into());
        self
    }

    /// Caps solver iterations per component.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    fn coordinate_field(&self, region: &Region) -> Result<CoordinateField, RegistrationFailure> {
        let field = match (&self.coordinate_field, region.field(MODEL_COORDINATES)) {
            (Some(name), _) => CoordinateField::discover(region, Some(name.as_str()))?,
            (None, Some(field)) => CoordinateField::from_field(field)?,
            (None, None) => CoordinateField::discover(region, None)?,
        };
        Ok(field)
    }
}

/// Named model markers and where they sit in the mesh.
fn model_markers(
    region: &Region,
    coordinates: &CoordinateField,
) -> Result<(Vec<NamedPoint>, Vec<Location>), RegistrationFailure> {
    let fields = MarkerFields::discover(region)?;
    let Some(group) = region.field(&fields.group).and_then(Field::as_group) else {
        return Ok((Vec::new(), Vec::new()));
    };

    let mut points = Vec::new();
    let mut locations = Vec::new();
    for node in group.nodes() {
        let resolved = region.mesh_location(&fields.location, node).and_then(|location| {
            let x = region.evaluate_real(coordinates.name(), &location)?;
            let name = region.evaluate_string(&fields.name, node)?;
            let position = Point3::new(
                x.first().copied().unwrap_or_default(),
                x.get(1).copied().unwrap_or_default(),
                x.get(2).copied().unwrap_or_default(),
            );
            Ok((location, NamedPoint::new(name, position)))
        });
        match resolved {
            Ok((location, point)) => {
                locations.push(location);
                points.push(point);
            }
            Err(error) => debug!(node, %error, "Model marker has no usable location"),
        }
    }
    Ok((points, locations))
}

impl Registrar for LandmarkRegistrar {
    fn align(&mut self, job: &RegistrationJob) -> Result<PathBuf, RegistrationFailure> {
        let data = MarkerSet::load(job.markers())?.named_points();
        let mut region = load_region(job.model())?;
        let coordinates = self.coordinate_field(&region)?;
        let (model, _) = model_markers(&region, &coordinates)?;

        let result = align_named_points(&model, &data, &LandmarkParams::new().with_scale(true))?;
        result
            .transform
            .apply_to_field(&mut region, coordinates.name())?;

        let output = job.aligned_path();
        save_region(&region, &output)?;
        info!(
            model = %job.model().display(),
            pairs = result.pairing.pairs.len(),
            rms_error = result.rms_error,
            scale = result.transform.scale,
            "Aligned organ to markers"
        );
        self.aligned = Some(job.model().to_path_buf());
        Ok(output)
    }

    fn fit(
        &mut self,
        job: &RegistrationJob,
        weights: &FitWeights,
    ) -> Result<PathBuf, RegistrationFailure> {
        if self.aligned.as_deref() != Some(job.model()) {
            return Err(RegistrationFailure::NotAligned {
                path: job.model().to_path_buf(),
            });
        }

        let data = MarkerSet::load(job.markers())?.named_points();
        let mut region = load_region(job.aligned_path())?;
        let coordinates = self.coordinate_field(&region)?;
        let (model, locations) = model_markers(&region, &coordinates)?;

        let mut problem = FitProblem::from_region(&region, coordinates.name())?;
        let pairing = pair_by_name(&model, &data);
        for &(m, d) in &pairing.pairs {
            problem.add_point_at(&region, &locations[m], data[d].position)?;
        }

        let mut params = FitParams::new()
            .with_data_weight(weights.data_weight)
            .with_strain_penalty(weights.strain_penalty)
            .with_curvature_penalty(weights.curvature_penalty);
        if let Some(max_iterations) = self.max_iterations {
            params = params.with_max_iterations(max_iterations);
        }
        let result = PenalizedFit::new(params).solve(&problem)?;
        result.apply(&problem, &mut region, coordinates.name())?;

        let output = job.fitted_path();
        save_region(&region, &output)?;
        info!(
            model = %job.model().display(),
            points = problem.point_count(),
            iterations = result.iterations,
            converged = result.converged,
            rms_before = result.rms_before,
            rms_after = result.rms_after,
            "Fitted organ to markers"
        );
        self.aligned = None;
        Ok(output)
    }
}
