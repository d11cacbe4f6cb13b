//! Insertion orchestrator: markers once, then every organ in order.

use std::fs;
use std::path::{Path, PathBuf};

use fe_mesh_io::load_region;
use tracing::{debug, info};

use crate::busy::{BusyGuard, BusyIndicator};
use crate::classify::{Classification, base_name};
use crate::compose::compose_organ_group;
use crate::config::InserterConfig;
use crate::error::{InsertError, InsertResult, RegistrationFailure};
use crate::manifest::{AnnotationRecord, manifest_path, write_manifest};
use crate::markers::MarkerSet;
use crate::registrar::{Registrar, RegistrationJob};
use crate::schema::FieldSchema;

/// What happened to one organ file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganOutcome {
    /// Input file.
    pub input: PathBuf,
    /// Classified organ name, also the group and resource name.
    pub organ: String,
    /// Provenance of the organ's vocabulary entry.
    pub source: Option<String>,
    /// File holding the tagged organ.
    pub output: PathBuf,
    /// True if registration was skipped.
    pub bypassed: bool,
    /// Top-dimension elements in the organ group.
    pub group_elements: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionReport {
    /// Marker set file.
    pub marker_file: PathBuf,
    /// Number of extracted markers.
    pub marker_count: usize,
    /// Annotation manifest file.
    pub manifest: PathBuf,
    /// One outcome per organ input, in input order.
    pub organs: Vec<OrganOutcome>,
}

impl InsertionReport {
    /// Produced organ files, one per input, in input order.
    #[must_use]
    pub fn output_files(&self) -> Vec<PathBuf> {
        self.organs.iter().map(|o| o.output.clone()).collect()
    }
}

/// Inserts organ meshes into a scaffold's marker frame.
///
/// # Example
///
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use organ_inserter::{InserterConfig, LandmarkRegistrar, OrganInserter, TracingBusyIndicator};
///
/// let inserter = OrganInserter::new(InserterConfig::default());
/// let report = inserter.run(
///     Path::new("body.exf"),
///     &[PathBuf::from("heart_data.exf")],
///     Path::new("out"),
///     &mut LandmarkRegistrar::new(),
///     &TracingBusyIndicator,
/// )?;
/// println!("{} markers", report.marker_count);
/// # Ok::<(), organ_inserter::InsertError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct OrganInserter {
    config: InserterConfig,
}

impl OrganInserter {
    /// Creates an inserter.
    #[must_use]
    pub const fn new(config: InserterConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &InserterConfig {
        &self.config
    }

    /// Runs the whole insertion.
    ///
    /// The scaffold schema is resolved and the marker set written before any
    /// organ file is touched. Each organ is then classified; bypassed organs
    /// are copied into `output_dir` and tagged, others are aligned, fitted and
    /// the fitted file tagged. The manifest is written last, only if every
    /// organ succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Files written before it stay on disk.
    pub fn run<R: Registrar + ?Sized>(
        &self,
        scaffold: &Path,
        organs: &[PathBuf],
        output_dir: &Path,
        registrar: &mut R,
        busy: &dyn BusyIndicator,
    ) -> InsertResult<InsertionReport> {
        info!(
            scaffold = %scaffold.display(),
            organs = organs.len(),
            output = %output_dir.display(),
            "Starting organ insertion"
        );

        let region = load_region(scaffold)?;
        let schema = FieldSchema::resolve(&region, self.config.coordinate_field.as_deref())?;
        debug!(
            coordinates = schema.coordinates.name(),
            marker_group = %schema.markers.group,
            "Resolved scaffold schema"
        );
        let markers = MarkerSet::extract(&region, &schema, self.config.marker_policy)?;
        drop(region);

        fs::create_dir_all(output_dir)
            .map_err(|e| InsertError::file_system("create directory", output_dir, e))?;
        let marker_file = MarkerSet::file_path(scaffold, output_dir);
        markers.save(&marker_file)?;

        let mut outcomes = Vec::with_capacity(organs.len());
        for organ in organs {
            let classification = self.config.classifier.classify(organ);
            let outcome = if classification.bypass {
                bypass_registration(organ, classification, output_dir)?
            } else {
                self.register(organ, classification, &marker_file, output_dir, registrar, busy)?
            };
            outcomes.push(outcome);
        }

        let manifest = manifest_path(output_dir);
        let mut records = Vec::with_capacity(outcomes.len() + 1);
        records.push(AnnotationRecord::new(
            self.config.scaffold_label.as_str(),
            Some(self.config.scaffold_source.as_str()),
            scaffold,
            scaffold,
        ));
        for outcome in &outcomes {
            records.push(AnnotationRecord::new(
                outcome.organ.as_str(),
                outcome.source.as_deref(),
                &outcome.input,
                &outcome.output,
            ));
        }
        write_manifest(&manifest, &records)?;

        info!(
            markers = markers.len(),
            organs = outcomes.len(),
            manifest = %manifest.display(),
            "Organ insertion complete"
        );
        Ok(InsertionReport {
            marker_file,
            marker_count: markers.len(),
            manifest,
            organs: outcomes,
        })
    }

    fn register<R: Registrar + ?Sized>(
        &self,
        organ: &Path,
        classification: Classification,
        marker_file: &Path,
        output_dir: &Path,
        registrar: &mut R,
        busy: &dyn BusyIndicator,
    ) -> InsertResult<OrganOutcome> {
        let failed = |source: RegistrationFailure| InsertError::Registration {
            organ: classification.organ.clone(),
            source,
        };
        let job = RegistrationJob::new(organ, marker_file, output_dir);
        info!(organ = %classification.organ, base = %base_name(organ), "Transforming organ");

        registrar.align(&job).map_err(failed)?;
        {
            let _busy = BusyGuard::new(busy, &classification.organ);
            registrar
                .fit(&job, &self.config.fit_weights)
                .map_err(failed)?;
        }

        let output = job.fitted_path();
        let composed = compose_organ_group(&output, &classification.organ)?;
        Ok(OrganOutcome {
            input: organ.to_path_buf(),
            organ: classification.organ,
            source: classification.source,
            output,
            bypassed: false,
            group_elements: composed.elements,
        })
    }
}

/// Copies a bypassed organ into `output_dir` unless it is already there, then tags it.
fn bypass_registration(
    organ: &Path,
    classification: Classification,
    output_dir: &Path,
) -> InsertResult<OrganOutcome> {
    let name = organ.file_name().ok_or_else(|| {
        InsertError::file_system(
            "copy",
            organ,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        )
    })?;
    let output = output_dir.join(name);
    if !same_file(organ, &output) {
        fs::copy(organ, &output).map_err(|e| InsertError::file_system("copy", organ, e))?;
    }
    info!(organ = %classification.organ, path = %output.display(), "Bypassing registration");

    let composed = compose_organ_group(&output, &classification.organ)?;
    Ok(OrganOutcome {
        input: organ.to_path_buf(),
        organ: classification.organ,
        source: classification.source,
        output,
        bypassed: true,
        group_elements: composed.elements,
    })
}

/// True if both paths resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
