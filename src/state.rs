use std::path::{Path, PathBuf};

use crate::color::GroupColors;
use crate::data::loader;
use crate::data::model::QuantTable;
use crate::settings::AnalysisSettings;
use crate::stats::classify::{Classification, classify_with_details};
use crate::stats::engine::GroupPair;
use crate::stats::threshold::{Thresholds, compute_thresholds};

/// Percentiles reported for the raw abundance distribution.
pub const ABUNDANCE_PERCENTILES: [f64; 3] = [90.0, 95.0, 99.0];

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Reproducibility,
    Volcano,
    Altered,
}

// ---------------------------------------------------------------------------
// Hover annotation
// ---------------------------------------------------------------------------

/// One point of the volcano plot, copied out of the classification.
#[derive(Debug, Clone, PartialEq)]
pub struct VolcanoPoint {
    pub protein: String,
    /// log2 fold change.
    pub x: f64,
    /// technical variance.
    pub y: f64,
    pub flagged: bool,
}

/// Which protein the pointer is over. Owned by the view; only holds copies
/// of already-computed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverState {
    pub protein: Option<String>,
    pub position: Option<[f64; 2]>,
}

impl HoverState {
    pub fn clear(&mut self) {
        self.protein = None;
        self.position = None;
    }

    /// Annotate the point nearest to `pointer`, if it lies within `radius`.
    /// Distances are measured after dividing by `scale` (plot units per
    /// pixel on each axis), so `radius` is in pixels.
    pub fn update(&mut self, points: &[VolcanoPoint], pointer: [f64; 2], scale: [f64; 2], radius: f64) {
        let dist = |p: &VolcanoPoint| {
            let dx = (p.x - pointer[0]) / scale[0];
            let dy = (p.y - pointer[1]) / scale[1];
            (dx * dx + dy * dy).sqrt()
        };
        let nearest = points
            .iter()
            .map(|p| (dist(p), p))
            .filter(|(d, _)| d.is_finite() && *d <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((_, p)) => {
                self.protein = Some(p.protein.clone());
                self.position = Some([p.x, p.y]);
            }
            None => self.clear(),
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Loaded table (None until user loads a file).
    pub table: Option<QuantTable>,

    /// File the table came from, for reloading after a settings change.
    pub source: Option<PathBuf>,

    /// Every header of the last opened file, selected or not.
    pub available_columns: Vec<String>,

    pub settings: AnalysisSettings,

    /// Comma-separated group editor contents.
    pub group_input: String,

    pub colors: GroupColors,

    /// Percentile thresholds over every abundance in the table.
    pub abundance_thresholds: Option<Thresholds>,

    /// Result of the last analysis run.
    pub classification: Option<Classification>,

    pub view: View,

    /// Pair shown in the volcano view.
    pub volcano_pair: Option<GroupPair>,

    pub hover: HoverState,

    /// Maximum number of channels drawn in the reproducibility grid.
    pub grid_limit: usize,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            grid_limit: 8,
            ..Default::default()
        }
    }

    /// Load a table with the current column selection. The file's headers
    /// are kept even when loading fails, so the selection can be fixed.
    pub fn open(&mut self, path: &Path) {
        self.available_columns = match loader::list_columns(path) {
            Ok(headers) => headers,
            Err(e) => {
                log::warn!("Could not list columns of {}: {e:#}", path.display());
                Vec::new()
            }
        };
        match loader::load_file(path, &self.settings.columns, self.settings.missing) {
            Ok(table) => {
                log::info!(
                    "Loaded {} proteins × {} channels from {}",
                    table.len(),
                    table.columns.len(),
                    path.display()
                );
                self.set_table(table, Some(path.to_path_buf()));
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.source = Some(path.to_path_buf());
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Headers the current column selection would pick from the open file.
    pub fn preview_columns(&self) -> Vec<String> {
        self.settings.columns.select(&self.available_columns)
    }

    /// Add or remove one header from the explicit column list. The first
    /// toggle starts from whatever the filters currently select.
    pub fn toggle_explicit_column(&mut self, header: &str) {
        if self.settings.columns.explicit.is_empty() {
            self.settings.columns.explicit = self.preview_columns();
        }
        let explicit = &mut self.settings.columns.explicit;
        if let Some(pos) = explicit.iter().position(|c| c == header) {
            explicit.remove(pos);
        } else {
            explicit.push(header.to_string());
        }
    }

    /// Re-read the current file, e.g. after the column selection changed.
    pub fn reload(&mut self) {
        if let Some(path) = self.source.clone() {
            self.open(&path);
        }
    }

    /// Ingest a newly loaded table and drop stale results.
    pub fn set_table(&mut self, table: QuantTable, source: Option<PathBuf>) {
        let all: Vec<f64> = table.values.iter().flatten().copied().collect();
        self.abundance_thresholds = match compute_thresholds(&all, &ABUNDANCE_PERCENTILES) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("No abundance thresholds: {e}");
                None
            }
        };
        self.table = Some(table);
        self.source = source;
        self.classification = None;
        self.volcano_pair = None;
        self.hover.clear();
        self.status_message = None;
    }

    /// Replace the settings wholesale (File → Load settings).
    pub fn apply_settings(&mut self, settings: AnalysisSettings) {
        self.group_input = settings.groups.join(", ");
        self.colors = GroupColors::new(&settings.groups);
        self.settings = settings;
    }

    /// Parse the group editor into `settings.groups`.
    pub fn commit_group_input(&mut self) {
        self.settings.groups = self
            .group_input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.colors = GroupColors::new(&self.settings.groups);
    }

    /// Run the fold-change / variance classification with the current
    /// settings.
    pub fn run_analysis(&mut self) {
        let Some(table) = &self.table else {
            self.status_message = Some("Load a table first".to_string());
            return;
        };
        let s = &self.settings;
        match classify_with_details(
            table,
            s.groups.as_slice(),
            s.fold_change_threshold,
            s.variance_percentile,
            s.approx_zero,
        ) {
            Ok(classification) => {
                log::info!(
                    "{} altered proteins across {} group pairs",
                    classification.proteins().len(),
                    classification.statistics.pairs().len()
                );
                let pairs = classification.statistics.pairs();
                if !self.volcano_pair.as_ref().is_some_and(|p| pairs.contains(p)) {
                    self.volcano_pair = pairs.into_iter().next();
                }
                self.classification = Some(classification);
                self.hover.clear();
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Analysis failed: {e}");
                self.classification = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Points of the volcano plot for the selected pair.
    pub fn volcano_points(&self) -> Vec<VolcanoPoint> {
        let (Some(c), Some(pair)) = (&self.classification, &self.volcano_pair) else {
            return Vec::new();
        };
        c.statistics
            .pair_records(pair)
            .map(|(protein, stat)| VolcanoPoint {
                protein: protein.to_string(),
                x: stat.fold_change.log2(),
                y: stat.variance,
                flagged: c.is_flagged(pair, protein),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_state() -> AppState {
        let table = QuantTable::from_rows(
            vec!["A_1".into(), "A_2".into(), "B_1".into(), "B_2".into()],
            vec![
                ("P1".into(), vec![10.0, 10.0, 40.0, 40.0]),
                ("P2".into(), vec![1.0, 3.0, 2.0, 2.0]),
            ],
        )
        .unwrap();
        let mut state = AppState::new();
        state.set_table(table, None);
        state.group_input = "A, B,".to_string();
        state.commit_group_input();
        state
    }

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn point(protein: &str, x: f64, y: f64) -> VolcanoPoint {
        VolcanoPoint {
            protein: protein.to_string(),
            x,
            y,
            flagged: false,
        }
    }

    #[test]
    fn test_open_lists_headers() {
        let file = write_table("id\tAbundance: A_1\tAbundance: B_1\tNote\nP1\t1\t2\tx\n");
        let mut state = AppState::new();
        state.settings.columns.index = "id".to_string();
        state.open(file.path());

        assert_eq!(
            state.available_columns,
            vec!["id", "Abundance: A_1", "Abundance: B_1", "Note"]
        );
        assert_eq!(state.preview_columns(), vec!["Abundance: A_1", "Abundance: B_1"]);
        assert_eq!(state.table.as_ref().map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_headers_kept_when_selection_fails() {
        let file = write_table("id\tA_1\tB_1\nP1\t1\t2\n");
        let mut state = AppState::new();
        state.settings.columns.index = "id".to_string();
        state.open(file.path());

        // the default "Abundance:" prefix matches nothing
        assert!(state.table.is_none());
        assert!(state.status_message.is_some());
        assert_eq!(state.available_columns, vec!["id", "A_1", "B_1"]);

        state.toggle_explicit_column("A_1");
        state.toggle_explicit_column("B_1");
        assert_eq!(state.settings.columns.explicit, vec!["A_1", "B_1"]);
        state.reload();
        assert_eq!(state.table.as_ref().map(|t| t.columns.len()), Some(2));
    }

    #[test]
    fn test_toggle_starts_from_filter_selection() {
        let mut state = AppState::new();
        state.available_columns = vec![
            "Proteins Unique Sequence ID".to_string(),
            "Abundance: a".to_string(),
            "Abundance: b".to_string(),
        ];
        state.toggle_explicit_column("Abundance: a");
        assert_eq!(state.settings.columns.explicit, vec!["Abundance: b"]);
    }

    #[test]
    fn test_group_input_parsed() {
        let state = create_state();
        assert_eq!(state.settings.groups, vec!["A", "B"]);
    }

    #[test]
    fn test_abundance_thresholds_on_load() {
        let state = create_state();
        let t = state.abundance_thresholds.as_ref().unwrap();
        // descending [40, 40, 10, 10, 3, 2, 2, 1], rank ceil(8 * 0.1) = 1
        assert_eq!(t.with_zeros(90.0), Some(40.0));
        assert_eq!(t.len(), ABUNDANCE_PERCENTILES.len());
    }

    #[test]
    fn test_run_analysis() {
        let mut state = create_state();
        state.run_analysis();

        assert!(state.status_message.is_none());
        assert_eq!(state.volcano_pair, Some(GroupPair::new("A", "B")));

        let points = state.volcano_points();
        assert_eq!(points.len(), 2);
        let p1 = points.iter().find(|p| p.protein == "P1").unwrap();
        assert!((p1.x - 2.0).abs() < 1e-10);
        assert!(p1.flagged);
    }

    #[test]
    fn test_run_analysis_reports_error() {
        let mut state = create_state();
        state.settings.fold_change_threshold = 0.5;
        state.run_analysis();

        assert!(state.classification.is_none());
        assert!(state.status_message.unwrap().contains("greater than 1"));
    }

    #[test]
    fn test_hover_nearest_point() {
        let points = vec![point("P1", 0.0, 0.0), point("P2", 1.0, 1.0)];
        let mut hover = HoverState::default();

        hover.update(&points, [0.9, 0.8], [0.1, 0.1], 5.0);
        assert_eq!(hover.protein.as_deref(), Some("P2"));
        assert_eq!(hover.position, Some([1.0, 1.0]));

        hover.update(&points, [5.0, 5.0], [0.1, 0.1], 5.0);
        assert_eq!(hover, HoverState::default());
    }
}
