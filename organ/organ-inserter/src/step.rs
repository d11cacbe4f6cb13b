//! Workflow host step: three ports, an identifier, and one execution.
//!
//! Port 0 takes the scaffold file, port 1 the organ files, and port 2
//! provides the produced organ files as absolute paths. Outputs are written
//! to the step location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, info};

use crate::busy::BusyIndicator;
use crate::error::InsertResult;
use crate::inserter::{InsertionReport, OrganInserter};
use crate::registrar::Registrar;

/// Display name of the step.
pub const STEP_NAME: &str = "Organ Inserter";
/// Workflow category of the step.
pub const STEP_CATEGORY: &str = "Registration";

/// Port receiving the scaffold file.
pub const PORT_SCAFFOLD: usize = 0;
/// Port receiving the organ files.
pub const PORT_ORGANS: usize = 1;
/// Port providing the produced organ files.
pub const PORT_OUTPUTS: usize = 2;

/// Direction and arity of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Consumes one file location.
    Uses,
    /// Consumes a list of file locations.
    UsesListOf,
    /// Provides file locations.
    Provides,
}

/// The step's ports, indexed by port number.
pub const PORTS: [PortRole; 3] = [PortRole::Uses, PortRole::UsesListOf, PortRole::Provides];

/// Data passed through a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortData {
    /// One file location.
    File(PathBuf),
    /// A list of file locations.
    Files(Vec<PathBuf>),
}

/// Errors raised by the step contract.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    /// Execution was requested before a valid configuration was set.
    #[error("step '{identifier}' is not configured")]
    Unconfigured {
        /// Current identifier.
        identifier: String,
    },

    /// An input port has no data.
    #[error("no data on port {port}")]
    MissingPortData {
        /// Port index.
        port: usize,
    },

    /// The port does not exist or does not accept this data.
    #[error("port {port} does not accept {given}")]
    InvalidPort {
        /// Port index.
        port: usize,
        /// What was offered.
        given: &'static str,
    },

    /// The configuration could not be converted to or from JSON.
    #[error("step configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Persisted step configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Identifier, unique within a workflow.
    pub identifier: String,
}

/// Keys present in a serialized configuration; absent keys are left as is.
#[derive(Debug, Deserialize)]
struct StepConfigUpdate {
    identifier: Option<String>,
}

/// Organ insertion as a workflow step.
#[derive(Debug, Clone)]
pub struct OrganInserterStep {
    location: PathBuf,
    config: StepConfig,
    configured: bool,
    inserter: OrganInserter,
    scaffold: Option<PathBuf>,
    organs: Option<Vec<PathBuf>>,
    outputs: Vec<PathBuf>,
}

impl OrganInserterStep {
    /// Creates an unconfigured step writing to `location`.
    #[must_use]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            config: StepConfig::default(),
            configured: false,
            inserter: OrganInserter::default(),
            scaffold: None,
            organs: None,
            outputs: Vec::new(),
        }
    }

    /// Runs with the given inserter instead of the default one.
    #[must_use]
    pub fn with_inserter(mut self, inserter: OrganInserter) -> Self {
        self.inserter = inserter;
        self
    }

    /// Output directory of the step.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Current identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.config.identifier
    }

    /// Sets the identifier, as the host does when loading a workflow.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.config.identifier = identifier.into();
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Returns true once a valid configuration has been accepted.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.configured
    }

    /// Checks the current identifier given how often it occurs in the workflow.
    ///
    /// Valid means non-empty and occurring exactly once.
    #[must_use]
    pub fn validate(&self, identifier_occurrences: usize) -> bool {
        !self.config.identifier.is_empty() && identifier_occurrences == 1
    }

    /// Replaces the configuration and re-validates it.
    ///
    /// Returns whether the step is now configured.
    pub fn configure(
        &mut self,
        config: StepConfig,
        occurrences_of: impl Fn(&str) -> usize,
    ) -> bool {
        self.config = config;
        self.configured = self.validate(occurrences_of(&self.config.identifier));
        self.configured
    }

    /// Serializes the configuration as key-sorted JSON indented by four spaces.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Serialize`] if serialization fails.
    pub fn serialize(&self) -> StepResult<String> {
        let value = serde_json::to_value(&self.config)?;
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Updates the configuration from [`serialize`](Self::serialize) output and re-validates.
    ///
    /// Keys absent from `text` keep their current values. Returns whether the
    /// step is now configured.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Serialize`] if `text` is not a configuration object.
    pub fn deserialize(
        &mut self,
        text: &str,
        occurrences_of: impl Fn(&str) -> usize,
    ) -> StepResult<bool> {
        let update: StepConfigUpdate = serde_json::from_str(text)?;
        if let Some(identifier) = update.identifier {
            self.config.identifier = identifier;
        }
        self.configured = self.validate(occurrences_of(&self.config.identifier));
        debug!(identifier = %self.config.identifier, configured = self.configured, "Deserialized step");
        Ok(self.configured)
    }

    /// Sets the data of an input port.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPort`] for an output or unknown port, or
    /// data of the wrong arity.
    pub fn set_port_data(&mut self, port: usize, data: PortData) -> StepResult<()> {
        match (port, data) {
            (PORT_SCAFFOLD, PortData::File(path)) => self.scaffold = Some(path),
            (PORT_ORGANS, PortData::Files(paths)) => self.organs = Some(paths),
            (PORT_ORGANS, PortData::File(path)) => self.organs = Some(vec![path]),
            (port, PortData::File(_)) => {
                return Err(StepError::InvalidPort { port, given: "a file" });
            }
            (port, PortData::Files(_)) => {
                return Err(StepError::InvalidPort {
                    port,
                    given: "a list of files",
                });
            }
        }
        Ok(())
    }

    /// Produced organ files, resolved against the step location.
    ///
    /// Paths that exist are canonicalized; others are made absolute against
    /// the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPort`] for any port but the output port.
    pub fn port_data(&self, port: usize) -> StepResult<Vec<PathBuf>> {
        if port != PORT_OUTPUTS {
            return Err(StepError::InvalidPort {
                port,
                given: "a read",
            });
        }
        Ok(self
            .outputs
            .iter()
            .map(|file| {
                file.canonicalize()
                    .or_else(|_| std::path::absolute(file))
                    .unwrap_or_else(|_| file.clone())
            })
            .collect())
    }

    /// Runs the insertion on the port data.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Unconfigured`] or [`StepError::MissingPortData`]
    /// before touching any file, otherwise the first insertion failure.
    pub fn execute<R: Registrar + ?Sized>(
        &mut self,
        registrar: &mut R,
        busy: &dyn BusyIndicator,
    ) -> InsertResult<InsertionReport> {
        if !self.configured {
            return Err(StepError::Unconfigured {
                identifier: self.config.identifier.clone(),
            }
            .into());
        }
        let scaffold = self
            .scaffold
            .as_deref()
            .ok_or(StepError::MissingPortData {
                port: PORT_SCAFFOLD,
            })?;
        let organs = self.organs.as_deref().ok_or(StepError::MissingPortData {
            port: PORT_ORGANS,
        })?;

        info!(identifier = %self.config.identifier, step = STEP_NAME, "Executing step");
        let report = self
            .inserter
            .run(scaffold, organs, &self.location, registrar, busy)?;
        self.outputs = report.output_files();
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::busy::NoBusyIndicator;
    use crate::error::InsertError;
    use crate::registrar::LandmarkRegistrar;
    use tempfile::tempdir;

    fn once(_: &str) -> usize {
        1
    }

    #[test]
    fn serialize_sorts_keys_with_four_space_indent() {
        let mut step = OrganInserterStep::new("/work");
        step.set_identifier("organ_inserter_1");
        assert_eq!(
            step.serialize().unwrap(),
            "{\n    \"identifier\": \"organ_inserter_1\"\n}"
        );
    }

    #[test]
    fn deserialize_updates_and_validates() {
        let mut source = OrganInserterStep::new("/work");
        source.set_identifier("inserter");
        let text = source.serialize().unwrap();

        let mut step = OrganInserterStep::new("/work");
        assert!(step.deserialize(&text, once).unwrap());
        assert_eq!(step.identifier(), "inserter");
        assert!(step.is_configured());

        assert!(!step.deserialize("{}", |_| 2).unwrap());
        assert_eq!(step.identifier(), "inserter");
        assert!(step.deserialize("not json", once).is_err());
    }

    #[test]
    fn validation_requires_unique_non_empty_identifier() {
        let mut step = OrganInserterStep::new("/work");
        assert!(!step.validate(1));
        step.set_identifier("a");
        assert!(step.validate(1));
        assert!(!step.validate(0));
        assert!(!step.validate(2));
        assert!(step.configure(StepConfig { identifier: "b".into() }, once));
        assert!(!step.configure(StepConfig::default(), once));
    }

    #[test]
    fn port_data_checks_direction() {
        let mut step = OrganInserterStep::new("/work");
        step.set_port_data(PORT_SCAFFOLD, PortData::File("body.exf".into()))
            .unwrap();
        step.set_port_data(PORT_ORGANS, PortData::Files(vec!["heart.exf".into()]))
            .unwrap();
        assert!(matches!(
            step.set_port_data(PORT_OUTPUTS, PortData::Files(Vec::new())),
            Err(StepError::InvalidPort { port: 2, .. })
        ));
        assert!(matches!(
            step.set_port_data(PORT_SCAFFOLD, PortData::Files(Vec::new())),
            Err(StepError::InvalidPort { port: 0, .. })
        ));
        assert!(step.port_data(PORT_SCAFFOLD).is_err());
        assert!(step.port_data(PORT_OUTPUTS).unwrap().is_empty());
        assert_eq!(PORTS[PORT_OUTPUTS], PortRole::Provides);
    }

    #[test]
    fn outputs_under_relative_location_are_absolute() {
        let mut step = OrganInserterStep::new("work");
        step.outputs = vec![PathBuf::from("work").join("colon.exf")];
        let outputs = step.port_data(PORT_OUTPUTS).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].is_absolute());
        assert!(outputs[0].ends_with("work/colon.exf"));
        assert!(!outputs[0].ends_with("work/work/colon.exf"));
    }

    #[test]
    fn unconfigured_step_does_not_run() {
        let dir = tempdir().unwrap();
        let mut step = OrganInserterStep::new(dir.path());
        step.set_port_data(PORT_SCAFFOLD, PortData::File(dir.path().join("body.exf")))
            .unwrap();
        step.set_port_data(PORT_ORGANS, PortData::Files(Vec::new()))
            .unwrap();
        let result = step.execute(&mut LandmarkRegistrar::new(), &NoBusyIndicator);
        assert!(matches!(
            result,
            Err(InsertError::Step(StepError::Unconfigured { .. }))
        ));
    }

    #[test]
    fn missing_port_data_is_reported() {
        let dir = tempdir().unwrap();
        let mut step = OrganInserterStep::new(dir.path());
        step.configure(StepConfig { identifier: "x".into() }, once);
        let result = step.execute(&mut LandmarkRegistrar::new(), &NoBusyIndicator);
        assert!(matches!(
            result,
            Err(InsertError::Step(StepError::MissingPortData { port: 0 }))
        ));
    }
}
