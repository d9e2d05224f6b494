use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column selection: which header names become value columns
// ---------------------------------------------------------------------------

/// Header predicates used to pick the abundance channels out of a wide
/// search-engine export.
///
/// Filters are applied in order: `prefix`, `suffix`, every `contains`
/// phrase, then every `not_contains` phrase. A non-empty `explicit` list
/// bypasses all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSelector {
    /// Column holding the protein identifiers.
    pub index: String,
    pub prefix: Option<String>,
    /// Experiment name, found at the end of the header.
    pub suffix: Option<String>,
    pub contains: Vec<String>,
    pub not_contains: Vec<String>,
    pub explicit: Vec<String>,
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self {
            index: "Proteins Unique Sequence ID".to_string(),
            prefix: Some("Abundance:".to_string()),
            suffix: None,
            contains: Vec::new(),
            not_contains: vec!["corrected".to_string(), "count".to_string()],
            explicit: Vec::new(),
        }
    }
}

impl ColumnSelector {
    /// Return the headers that pass every filter, in file order.
    /// The index column is never selected as a value column.
    pub fn select(&self, headers: &[String]) -> Vec<String> {
        if !self.explicit.is_empty() {
            return self
                .explicit
                .iter()
                .filter(|c| *c != &self.index)
                .cloned()
                .collect();
        }

        headers
            .iter()
            .filter(|h| **h != self.index)
            .filter(|h| self.prefix.as_deref().map_or(true, |p| h.starts_with(p)))
            .filter(|h| self.suffix.as_deref().map_or(true, |s| h.ends_with(s)))
            .filter(|h| self.contains.iter().all(|req| h.contains(req.as_str())))
            .filter(|h| !self.not_contains.iter().any(|req| h.contains(req.as_str())))
            .cloned()
            .collect()
    }
}

/// Strip the double quotes some exporters wrap around header names.
pub fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}
