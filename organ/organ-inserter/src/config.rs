//! Run configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classify::OrganClassifier;
use crate::markers::MarkerPolicy;
use crate::registrar::FitWeights;

/// Provenance identifier of the default scaffold.
pub const DEFAULT_SCAFFOLD_SOURCE: &str = "https://doi.org/10.26275/yibc-wyu2";

/// Manifest label of the scaffold row.
pub const DEFAULT_SCAFFOLD_LABEL: &str = "whole-body";

/// Errors reading or writing a configuration file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid configuration.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The file could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for an insertion run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InserterConfig {
    /// Organ vocabulary and bypass terms.
    pub classifier: OrganClassifier,
    /// Deformable fit weights.
    pub fit_weights: FitWeights,
    /// Handling of markers that cannot be evaluated.
    pub marker_policy: MarkerPolicy,
    /// Scaffold coordinate field to use instead of discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate_field: Option<String>,
    /// Provenance identifier written on the scaffold manifest row.
    pub scaffold_source: String,
    /// Organ label of the scaffold manifest row.
    pub scaffold_label: String,
}

impl Default for InserterConfig {
    fn default() -> Self {
        Self {
            classifier: OrganClassifier::default(),
            fit_weights: FitWeights::default(),
            marker_policy: MarkerPolicy::default(),
            coordinate_field: None,
            scaffold_source: DEFAULT_SCAFFOLD_SOURCE.to_string(),
            scaffold_label: DEFAULT_SCAFFOLD_LABEL.to_string(),
        }
    }
}

impl InserterConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration file; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded inserter config");
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let write_error = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| write_error(std::io::Error::other(e)))?;
        std::fs::write(path, text).map_err(write_error)
    }

    /// Replaces the organ classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: OrganClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the fit weights.
    #[must_use]
    pub const fn with_fit_weights(mut self, weights: FitWeights) -> Self {
        self.fit_weights = weights;
        self
    }

    /// Sets the marker policy.
    #[must_use]
    pub const fn with_marker_policy(mut self, policy: MarkerPolicy) -> Self {
        self.marker_policy = policy;
        self
    }

    /// Uses the named scaffold coordinate field.
    #[must_use]
    pub fn with_coordinate_field(mut self, name: impl Into<String>) -> Self {
        self.coordinate_field = Some(name.into());
        self
    }

    /// Sets the scaffold provenance identifier.
    #[must_use]
    pub fn with_scaffold_source(mut self, source: impl Into<String>) -> Self {
        self.scaffold_source = source.into();
        self
    }
}
