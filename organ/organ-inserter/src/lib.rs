//! Inserts organ meshes into a scaffold's marker frame.
//!
//! A run takes one scaffold carrying named markers and any number of organ
//! meshes:
//! - **Schema discovery** - Finds the scaffold's coordinate field and its
//!   marker name, location and group fields by inspecting field names and types
//! - **Marker extraction** - Evaluates every marker at its embedded location
//!   into a standalone named point set, saved once per run
//! - **Registration** - Aligns each organ to the markers, then fits it,
//!   through the [`Registrar`] contract
//! - **Composition** - Tags each resulting mesh with a group named after
//!   its organ, including the full subelement closure
//! - **Manifest** - Records organ names, sources and file names as CSV
//!
//! # Layer 0
//!
//! This is a Layer 0 crate. It drives files on disk through [`fe_mesh_io`]
//! and has no knowledge of user interfaces; busy notification goes through
//! [`BusyIndicator`] and the workflow host through [`OrganInserterStep`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use organ_inserter::{InserterConfig, LandmarkRegistrar, OrganInserter, NoBusyIndicator};
//!
//! let inserter = OrganInserter::new(InserterConfig::default());
//! let organs = vec![PathBuf::from("colon_segment.exf"), PathBuf::from("heart_data.exf")];
//! let report = inserter.run(
//!     Path::new("whole_body.exf"),
//!     &organs,
//!     Path::new("out"),
//!     &mut LandmarkRegistrar::new(),
//!     &NoBusyIndicator,
//! )?;
//! for path in report.output_files() {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), organ_inserter::InsertError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod busy;
mod classify;
mod compose;
mod config;
mod error;
mod inserter;
mod manifest;
mod markers;
mod registrar;
mod schema;
mod step;

pub use busy::{BusyGuard, BusyIndicator, NoBusyIndicator, TracingBusyIndicator};
pub use classify::{
    Classification, DEFAULT_BYPASS, DEFAULT_ORGANS, DEFAULT_SOURCES, OrganClassifier, OrganEntry,
    base_name,
};
pub use compose::{ComposeOutcome, compose_organ_group};
pub use config::{
    ConfigError, ConfigResult, DEFAULT_SCAFFOLD_LABEL, DEFAULT_SCAFFOLD_SOURCE, InserterConfig,
};
pub use error::{InsertError, InsertResult, RegistrationFailure};
pub use inserter::{InsertionReport, OrganInserter, OrganOutcome};
pub use manifest::{
    AnnotationRecord, MANIFEST_FILE_NAME, MANIFEST_HEADER, manifest_path, write_manifest,
};
pub use markers::{
    MARKER_COORDINATES_FIELD, MARKER_FILE_SUFFIX, MARKER_GROUP, MARKER_NAME_FIELD, MarkerError,
    MarkerPoint, MarkerPolicy, MarkerSet,
};
pub use registrar::{FitWeights, LandmarkRegistrar, MODEL_COORDINATES, Registrar, RegistrationJob};
pub use schema::{CoordinateField, FieldSchema, MarkerFields, SchemaError};
pub use step::{
    OrganInserterStep, PORT_ORGANS, PORT_OUTPUTS, PORT_SCAFFOLD, PORTS, PortData, PortRole,
    STEP_CATEGORY, STEP_NAME, StepConfig, StepError, StepResult,
};
