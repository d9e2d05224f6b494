use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::ColumnSelector;
use crate::data::model::MissingPolicy;

// ---------------------------------------------------------------------------
// Analysis settings
// ---------------------------------------------------------------------------

/// Everything needed to turn a file into a list of altered proteins.
/// Saved and restored as JSON from the File menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Minimum fold change (either direction), must exceed 1.
    pub fold_change_threshold: f64,
    /// Percentile of the non-zero technical variances used as noise cutoff.
    pub variance_percentile: f64,
    /// Substitute for a zero mean; derived from the data when `None`.
    pub approx_zero: Option<f64>,
    pub missing: MissingPolicy,
    /// Group-name substrings, e.g. cell types.
    pub groups: Vec<String>,
    pub columns: ColumnSelector,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            fold_change_threshold: 2.0,
            variance_percentile: 95.0,
            approx_zero: None,
            missing: MissingPolicy::ZeroFill,
            groups: Vec::new(),
            columns: ColumnSelector::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&text).context("parsing settings JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialising settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing settings to {}", path.display()))
    }
}
