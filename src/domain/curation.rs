// Feature/label curation over the current dataset's columns
use serde::Serialize;
use std::collections::BTreeSet;

const TIMESTAMP_COLUMN: &str = "timestamp";
const LABEL_HINTS: [&str; 3] = ["label", "class", "target"];

/// Columns that describe where a remote reading came from rather than what it measured.
pub const REMOTE_IDENTITY_COLUMNS: [&str; 3] = ["deviceId", "boardMode", "sensorId"];

/// The current prediction target and candidate inputs.
///
/// `label` is never a member of `features`, and both are drawn from `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Curation {
    columns: Vec<String>,
    label: Option<String>,
    features: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurationView {
    pub label: Option<String>,
    pub features: Vec<String>,
    pub feature_options: Vec<String>,
    pub label_options: Vec<String>,
}

impl Curation {
    /// Derive defaults for a freshly loaded set of columns.
    pub fn derive(columns: &[String]) -> Self {
        Self::derive_excluding(columns, &[])
    }

    /// Derive defaults, also keeping `excluded` out of the default features.
    pub fn derive_excluding(columns: &[String], excluded: &[&str]) -> Self {
        let label = columns
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                LABEL_HINTS.iter().any(|hint| lower.contains(hint))
            })
            .or_else(|| columns.last())
            .cloned();

        let features = columns
            .iter()
            .filter(|c| Some(*c) != label.as_ref())
            .filter(|c| c.as_str() != TIMESTAMP_COLUMN)
            .filter(|c| !excluded.contains(&c.as_str()))
            .cloned()
            .collect();

        Self {
            columns: columns.to_vec(),
            label,
            features,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    /// Make `column` the label, moving it out of the features first.
    pub fn set_label(&mut self, column: &str) -> bool {
        if !self.columns.iter().any(|c| c == column) {
            return false;
        }
        self.features.remove(column);
        self.label = Some(column.to_string());
        true
    }

    /// Add or remove `column` from the features. The label column is never toggled.
    pub fn toggle_feature(&mut self, column: &str) -> bool {
        if self.label() == Some(column) || !self.columns.iter().any(|c| c == column) {
            return false;
        }
        if !self.features.remove(column) {
            self.features.insert(column.to_string());
        }
        true
    }

    pub fn feature_options(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| Some(c.as_str()) != self.label())
            .cloned()
            .collect()
    }

    pub fn label_options(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.as_str() != TIMESTAMP_COLUMN)
            .cloned()
            .collect()
    }

    pub fn view(&self) -> CurationView {
        CurationView {
            label: self.label.clone(),
            features: self.features.iter().cloned().collect(),
            feature_options: self.feature_options(),
            label_options: self.label_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_curation() {
        let c = Curation::derive(&cols(&["timestamp", "IAQ", "VOC", "label"]));
        assert_eq!(c.label(), Some("label"));
        assert_eq!(c.features(), &set(&["IAQ", "VOC"]));
    }

    #[test]
    fn test_label_hint_is_case_insensitive_and_first_wins() {
        let c = Curation::derive(&cols(&["a", "TargetClass", "label", "b"]));
        assert_eq!(c.label(), Some("TargetClass"));
    }

    #[test]
    fn test_label_falls_back_to_last_column() {
        let c = Curation::derive(&cols(&["timestamp", "x", "y"]));
        assert_eq!(c.label(), Some("y"));
        assert_eq!(c.features(), &set(&["x"]));
    }

    #[test]
    fn test_empty_columns_have_no_label() {
        let c = Curation::derive(&[]);
        assert_eq!(c.label(), None);
        assert!(c.features().is_empty());
    }

    #[test]
    fn test_remote_identity_columns_excluded() {
        let c = Curation::derive_excluding(
            &cols(&["timestamp", "deviceId", "boardMode", "sensorId", "IAQ", "class"]),
            &REMOTE_IDENTITY_COLUMNS,
        );
        assert_eq!(c.label(), Some("class"));
        assert_eq!(c.features(), &set(&["IAQ"]));
        assert!(c.feature_options().contains(&"deviceId".to_string()));
    }

    #[test]
    fn test_set_label_removes_from_features() {
        let mut c = Curation::derive(&cols(&["timestamp", "IAQ", "VOC", "label"]));
        assert!(c.set_label("IAQ"));
        assert_eq!(c.label(), Some("IAQ"));
        assert!(!c.features().contains("IAQ"));
        assert!(!c.feature_options().contains(&"IAQ".to_string()));
    }

    #[test]
    fn test_set_label_rejects_unknown_column() {
        let mut c = Curation::derive(&cols(&["a", "label"]));
        assert!(!c.set_label("missing"));
        assert_eq!(c.label(), Some("label"));
    }

    #[test]
    fn test_toggle_feature() {
        let mut c = Curation::derive(&cols(&["timestamp", "IAQ", "VOC", "label"]));
        assert!(c.toggle_feature("VOC"));
        assert_eq!(c.features(), &set(&["IAQ"]));
        assert!(c.toggle_feature("timestamp"));
        assert_eq!(c.features(), &set(&["IAQ", "timestamp"]));
    }

    #[test]
    fn test_toggle_label_is_noop() {
        let mut c = Curation::derive(&cols(&["timestamp", "IAQ", "label"]));
        assert!(!c.toggle_feature("label"));
        assert!(!c.features().contains("label"));
    }

    #[test]
    fn test_label_options_skip_timestamp() {
        let c = Curation::derive(&cols(&["timestamp", "IAQ", "label"]));
        assert_eq!(c.label_options(), cols(&["IAQ", "label"]));
        assert_eq!(c.feature_options(), cols(&["timestamp", "IAQ"]));
    }
}
