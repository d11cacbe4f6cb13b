//! Organ classification by file name.
//!
//! The vocabulary and the bypass terms are data: an ordered table of organ
//! entries and a list of terms marking files that are already aligned.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default organ vocabulary, in priority order.
pub const DEFAULT_ORGANS: [&str; 6] = [
    "lung",
    "heart",
    "brainstem",
    "stomach",
    "bladder",
    "colon",
];

/// Provenance of each [`DEFAULT_ORGANS`] entry, keyed by vocabulary position.
pub const DEFAULT_SOURCES: [&str; 6] = [
    "https://doi.org/10.26275/dqpf-gqdt",
    "https://doi.org/10.26275/rets-qdch",
    "https://doi.org/10.26275/dqpf-gqdt",
    "https://doi.org/10.26275/yum2-z4uf",
    "https://doi.org/10.26275/xq3h-ba2b",
    "colon",
];

/// Default bypass term: files already in the scaffold frame.
pub const DEFAULT_BYPASS: &str = "colon";

/// The part of a path's file name before its first `.`.
///
/// `/data/heart.v2.exf` has base name `heart`.
#[must_use]
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

/// One organ of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganEntry {
    /// Organ name, matched case-insensitively against base names.
    pub name: String,
    /// Provenance identifier written to the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl OrganEntry {
    /// Creates an entry with no source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
        }
    }

    /// Sets the provenance identifier.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// How one organ file is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Organ name: the first matching vocabulary entry, else the matching
    /// bypass term, else the base name.
    pub organ: String,
    /// Provenance of the matching entry.
    pub source: Option<String>,
    /// True if registration is skipped.
    pub bypass: bool,
}

/// Priority-ordered organ vocabulary plus bypass terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganClassifier {
    /// Organ entries; earlier entries win.
    pub entries: Vec<OrganEntry>,
    /// Terms whose presence in a base name skips registration.
    pub bypass: Vec<String>,
}

impl Default for OrganClassifier {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ORGANS
                .iter()
                .zip(DEFAULT_SOURCES)
                .map(|(&name, source)| OrganEntry::new(name).with_source(source))
                .collect(),
            bypass: vec![DEFAULT_BYPASS.to_string()],
        }
    }
}

impl OrganClassifier {
    /// Creates a classifier from entries and bypass terms.
    #[must_use]
    pub fn new(entries: Vec<OrganEntry>, bypass: Vec<String>) -> Self {
        Self { entries, bypass }
    }

    /// Classifies an organ file.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Classification {
        let base = base_name(path);
        let lower = base.to_lowercase();

        let entry = self
            .entries
            .iter()
            .find(|e| lower.contains(&e.name.to_lowercase()));
        let term = self
            .bypass
            .iter()
            .find(|term| lower.contains(&term.to_lowercase()));
        let bypass = term.is_some();

        match (entry, term) {
            (Some(entry), _) => Classification {
                organ: entry.name.clone(),
                source: entry.source.clone(),
                bypass,
            },
            (None, Some(term)) => Classification {
                organ: term.to_lowercase(),
                source: None,
                bypass,
            },
            (None, None) => Classification {
                organ: base,
                source: None,
                bypass,
            },
        }
    }

    /// Organ name of a file.
    #[must_use]
    pub fn organ_name(&self, path: &Path) -> String {
        self.classify(path).organ
    }

    /// Returns true if the file skips registration.
    #[must_use]
    pub fn is_bypassed(&self, path: &Path) -> bool {
        self.classify(path).bypass
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn base_name_stops_at_first_dot() {
        assert_eq!(base_name(Path::new("/a/b/heart.v2.exf")), "heart");
        assert_eq!(base_name(Path::new("lung")), "lung");
        assert_eq!(base_name(Path::new("/")), "");
    }

    #[test]
    fn vocabulary_order_beats_position_in_name() {
        let classifier = OrganClassifier::default();
        let c = classifier.classify(Path::new("heart_and_lung.exf"));
        assert_eq!(c.organ, "lung");
        assert!(!c.bypass);
    }

    #[test]
    fn unknown_names_fall_back_to_base_name() {
        let classifier = OrganClassifier::default();
        assert_eq!(classifier.organ_name(Path::new("/x/xyz123.exf")), "xyz123");
        assert_eq!(classifier.organ_name(Path::new("Colon_Segment.exf")), "colon");
    }

    #[test]
    fn default_entries_carry_sources() {
        let classifier = OrganClassifier::default();
        let heart = classifier.classify(Path::new("heart_data.exf"));
        assert_eq!(heart.source.as_deref(), Some("https://doi.org/10.26275/rets-qdch"));
        let colon = classifier.classify(Path::new("colon_segment.exf"));
        assert_eq!(colon.organ, "colon");
        assert_eq!(colon.source.as_deref(), Some("colon"));
        assert!(colon.bypass);
    }

    #[test]
    fn bypass_term_names_unlisted_organ() {
        let classifier = OrganClassifier::new(
            vec![OrganEntry::new("kidney")],
            vec!["Prealigned".to_string()],
        );
        let c = classifier.classify(Path::new("PREALIGNED_gut.exf"));
        assert_eq!(c.organ, "prealigned");
        assert_eq!(c.source, None);
        assert!(c.bypass);
    }

    #[test]
    fn matching_ignores_case() {
        let classifier = OrganClassifier::default();
        assert_eq!(classifier.organ_name(Path::new("RightLUNG.exf")), "lung");
        assert!(classifier.is_bypassed(Path::new("COLON.exf")));
    }

    #[test]
    fn bypass_checks_file_name_only() {
        let classifier = OrganClassifier::default();
        assert!(!classifier.is_bypassed(Path::new("/colon/heart.exf")));
    }

    #[test]
    fn custom_table_carries_sources() {
        let classifier = OrganClassifier::new(
            vec![OrganEntry::new("kidney").with_source("doi:kidney")],
            vec!["prealigned".to_string()],
        );
        let c = classifier.classify(Path::new("left_kidney_prealigned.exf"));
        assert_eq!(c.organ, "kidney");
        assert_eq!(c.source.as_deref(), Some("doi:kidney"));
        assert!(c.bypass);
    }

    proptest! {
        #[test]
        fn earliest_vocabulary_term_wins(
            picks in proptest::collection::vec(0usize..DEFAULT_ORGANS.len(), 1..4),
            filler in "[0-9_]{0,4}",
        ) {
            let name: String = picks
                .iter()
                .map(|&i| format!("{}{filler}", DEFAULT_ORGANS[i]))
                .collect();
            let expected = DEFAULT_ORGANS[*picks.iter().min().unwrap()];
            let classifier = OrganClassifier::default();
            prop_assert_eq!(classifier.organ_name(Path::new(&format!("{name}.exf"))), expected);
        }

        #[test]
        fn colon_always_bypasses(
            prefix in "[a-z_]{0,8}",
            suffix in "[a-z_]{0,8}",
            upper in any::<bool>(),
        ) {
            let term = if upper { "COLON" } else { "colon" };
            let path = format!("{prefix}{term}{suffix}.exf");
            prop_assert!(OrganClassifier::default().is_bypassed(Path::new(&path)));
        }
    }
}
