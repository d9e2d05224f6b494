//! Flag proteins whose fold change is large while their technical variance
//! stays under a percentile cutoff.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use super::engine::{GroupPair, PairwiseStatistics, StatKey, compute_statistics};
use super::threshold::{compute_thresholds, validate_percentile};
use crate::data::model::QuantTable;
use crate::error::{QcError, Result};

/// One `(pair, protein)` record that passed both cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedRecord {
    pub pair: GroupPair,
    pub protein: String,
    pub fold_change: f64,
    pub variance: f64,
}

/// Full outcome of a classification run.
#[derive(Debug, Clone)]
pub struct Classification {
    pub fold_change_threshold: f64,
    pub variance_percentile: f64,
    /// Variance cutoff; `+inf` when every variance was zero.
    pub variance_threshold: f64,
    pub statistics: PairwiseStatistics,
    /// Qualifying records, ascending by fold change. A protein may appear
    /// once per group pair.
    pub flagged: Vec<FlaggedRecord>,
    flagged_keys: BTreeSet<StatKey>,
}

impl Classification {
    /// Distinct flagged proteins, ordered by the smallest fold change each
    /// was flagged with.
    pub fn proteins(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.flagged
            .iter()
            .filter(|r| seen.insert(r.protein.as_str()))
            .map(|r| r.protein.clone())
            .collect()
    }

    pub fn is_flagged(&self, pair: &GroupPair, protein: &str) -> bool {
        self.flagged_keys
            .contains(&(pair.clone(), protein.to_string()))
    }
}

/// Check caller-supplied cutoffs.
pub fn validate_cutoffs(fold_change_threshold: f64, variance_percentile: f64) -> Result<()> {
    // NaN fails the comparison as well
    if !(fold_change_threshold > 1.0) {
        return Err(QcError::InvalidThreshold(fold_change_threshold));
    }
    validate_percentile(variance_percentile)
}

/// Variance cutoff at `percentile`, ignoring structurally zero variances.
fn variance_cutoff(stats: &PairwiseStatistics, percentile: f64) -> Result<f64> {
    let variances: Vec<f64> = stats.variances.values().copied().collect();
    if !variances.iter().any(|&v| v != 0.0 && v.is_finite()) {
        log::warn!("every technical variance is zero; variance cutoff disabled");
        return Ok(f64::INFINITY);
    }
    let thresholds = compute_thresholds(&variances, &[percentile])?;
    Ok(thresholds
        .without_zeros(percentile)
        .unwrap_or(f64::INFINITY))
}

/// Select records from precomputed statistics.
pub fn classify_statistics(
    statistics: PairwiseStatistics,
    fold_change_threshold: f64,
    variance_percentile: f64,
) -> Result<Classification> {
    validate_cutoffs(fold_change_threshold, variance_percentile)?;

    let variance_threshold = variance_cutoff(&statistics, variance_percentile)?;
    let log_cutoff = fold_change_threshold.log2();

    let mut flagged: Vec<FlaggedRecord> = statistics
        .records()
        .filter(|(_, _, s)| s.fold_change.log2().abs() > log_cutoff && s.variance < variance_threshold)
        .map(|(pair, protein, s)| FlaggedRecord {
            pair: pair.clone(),
            protein: protein.to_string(),
            fold_change: s.fold_change,
            variance: s.variance,
        })
        .collect();
    flagged.sort_by(|a, b| a.fold_change.total_cmp(&b.fold_change));

    let flagged_keys = flagged
        .iter()
        .map(|r| (r.pair.clone(), r.protein.clone()))
        .collect();

    log::info!(
        "{} records flagged (|log2 FC| > {log_cutoff:.3}, variance < {variance_threshold:.4})",
        flagged.len()
    );

    Ok(Classification {
        fold_change_threshold,
        variance_percentile,
        variance_threshold,
        statistics,
        flagged,
        flagged_keys,
    })
}

/// Build groups from `table`, run the engine and classify.
pub fn classify_with_details<S: AsRef<str>>(
    table: &QuantTable,
    groups_spec: &[S],
    fold_change_threshold: f64,
    variance_percentile: f64,
    approx_zero: Option<f64>,
) -> Result<Classification> {
    validate_cutoffs(fold_change_threshold, variance_percentile)?;
    let groups = table.groups(groups_spec)?;
    let statistics = compute_statistics(&groups, approx_zero)?;
    classify_statistics(statistics, fold_change_threshold, variance_percentile)
}

/// Distinct proteins altered between any pair of the named groups,
/// ordered by ascending fold change.
pub fn classify_significant<S: AsRef<str>>(
    table: &QuantTable,
    groups_spec: &[S],
    fold_change_threshold: f64,
    variance_percentile: f64,
    approx_zero: Option<f64>,
) -> Result<Vec<String>> {
    classify_with_details(
        table,
        groups_spec,
        fold_change_threshold,
        variance_percentile,
        approx_zero,
    )
    .map(|c| c.proteins())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[(&str, &[f64])]) -> QuantTable {
        QuantTable::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter().map(|(p, v)| (p.to_string(), v.to_vec())).collect(),
        )
        .unwrap()
    }

    fn create_three_group_table() -> QuantTable {
        table(
            &["A_1", "A_2", "B_1", "B_2", "C_1", "C_2"],
            &[
                ("P1", &[10.0, 10.0, 40.0, 40.0, 80.0, 80.0]),
                ("P2", &[50.0, 50.0, 10.0, 10.0, 50.0, 50.0]),
                ("P4", &[1.0, 3.0, 100.0, 300.0, 1.0, 3.0]),
            ],
        )
    }

    #[test]
    fn test_two_group_scenario() {
        let t = table(
            &["A_1", "A_2", "A_3", "B_1", "B_2", "B_3"],
            &[
                ("P1", &[10.0, 0.0, 10.0, 40.0, 40.0, 0.0]),
                ("P2", &[5.0, 7.0, 6.0, 6.0, 5.0, 7.0]),
            ],
        );
        let result = classify_significant(&t, &["A", "B"], 2.0, 100.0, None).unwrap();
        assert_eq!(result, vec!["P1"]);
    }

    #[test]
    fn test_all_variances_zero() {
        let t = table(&["A_1", "A_2", "B_1", "B_2"], &[("P1", &[10.0, 0.0, 40.0, 0.0])]);
        let c = classify_with_details(&t, &["A", "B"], 2.0, 100.0, None).unwrap();
        assert!(c.variance_threshold.is_infinite());
        assert_eq!(c.proteins(), vec!["P1"]);
    }

    #[test]
    fn test_missing_cells_kept_as_nan() {
        let nan = f64::NAN;
        let t = table(
            &["A_1", "A_2", "A_3", "B_1", "B_2", "B_3"],
            &[
                ("P1", &[10.0, nan, 10.0, 40.0, 40.0, nan]),
                ("P2", &[5.0, 7.0, 6.0, 6.0, 5.0, 7.0]),
                ("P3", &[nan, nan, nan, 30.0, 30.0, 30.0]),
            ],
        );
        let c = classify_with_details(&t, &["A", "B"], 2.0, 100.0, None).unwrap();

        // half the smallest observed value, NaN cells ignored
        assert!((c.statistics.approx_zero - 2.5).abs() < 1e-10);
        assert!((c.variance_threshold - 1.0).abs() < 1e-10);
        for (_, _, stat) in c.statistics.records() {
            assert!(stat.fold_change.is_finite() && stat.variance.is_finite());
        }
        let pair = GroupPair::new("A", "B");
        let p3 = c.statistics.get(&pair, "P3").unwrap();
        assert!((p3.fold_change - 12.0).abs() < 1e-10);
        assert_eq!(c.proteins(), vec!["P1", "P3"]);
    }

    #[test]
    fn test_missing_policy_same_result() {
        use crate::data::filter::ColumnSelector;
        use crate::data::loader::load_file;
        use crate::data::model::MissingPolicy;
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        file.write_all(
            b"id\tA_1\tA_2\tA_3\tB_1\tB_2\tB_3\n\
              P1\t10\t\t10\t40\t40\tNA\n\
              P2\t5\t7\t6\t6\t5\t7\n",
        )
        .unwrap();
        let selector = ColumnSelector {
            index: "id".to_string(),
            prefix: None,
            ..Default::default()
        };

        let mut results = Vec::new();
        for missing in [MissingPolicy::ZeroFill, MissingPolicy::KeepMissing] {
            let t = load_file(file.path(), &selector, missing).unwrap();
            let c = classify_with_details(&t, &["A", "B"], 2.0, 100.0, None).unwrap();
            results.push((c.proteins(), c.variance_threshold, c.statistics.approx_zero));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1].0, vec!["P1"]);
    }

    #[test]
    fn test_explicit_approx_zero() {
        let t = table(
            &["A_1", "A_2", "B_1", "B_2"],
            &[("P1", &[0.0, 0.0, 3.0, 3.0]), ("P2", &[5.0, 7.0, 6.0, 8.0])],
        );

        let c = classify_with_details(&t, &["A", "B"], 2.0, 100.0, Some(0.5)).unwrap();
        assert_eq!(c.statistics.approx_zero, 0.5);
        let p1 = c.statistics.get(&GroupPair::new("A", "B"), "P1").unwrap();
        assert!((p1.fold_change - 6.0).abs() < 1e-10);
        assert_eq!(c.proteins(), vec!["P1"]);

        // derived: 3 / 2, so P1 sits exactly on the fold-change cutoff
        let derived = classify_significant(&t, &["A", "B"], 2.0, 100.0, None).unwrap();
        assert!(derived.is_empty());

        assert_eq!(
            classify_significant(&t, &["A", "B"], 2.0, 100.0, Some(0.0)),
            Err(QcError::DegenerateZero(0.0))
        );
    }

    #[test]
    fn test_deduplicated_and_ordered() {
        let t = create_three_group_table();
        let c = classify_with_details(&t, &["A", "B", "C"], 2.0, 100.0, None).unwrap();

        let fcs: Vec<f64> = c.flagged.iter().map(|r| r.fold_change).collect();
        assert_eq!(fcs.len(), 4);
        assert!(fcs.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(c.proteins(), vec!["P2", "P1"]);
        assert!(c.is_flagged(&GroupPair::new("A", "C"), "P1"));
        assert!(!c.is_flagged(&GroupPair::new("B", "C"), "P1"));
    }

    #[test]
    fn test_noisy_protein_excluded() {
        let t = create_three_group_table();
        let c = classify_with_details(&t, &["A", "B", "C"], 2.0, 100.0, None).unwrap();
        // the cutoff is the largest variance itself, which is not below it
        assert!((c.variance_threshold - 10001.0).abs() < 1e-10);
        assert!(!c.proteins().contains(&"P4".to_string()));
    }

    #[test]
    fn test_fold_change_band_excluded() {
        let t = table(
            &["A_1", "A_2", "B_1", "B_2"],
            &[
                ("half", &[10.0, 10.0, 5.0, 5.0]),
                ("double", &[10.0, 10.0, 20.0, 20.0]),
                ("inside", &[10.0, 10.0, 15.0, 15.0]),
                ("above", &[10.0, 10.0, 21.0, 21.0]),
                ("below", &[10.0, 10.0, 4.9, 4.9]),
                ("noise", &[1.0, 9.0, 1.0, 9.0]),
            ],
        );
        let result = classify_significant(&t, &["A", "B"], 2.0, 100.0, None).unwrap();
        assert_eq!(result, vec!["below", "above"]);
    }

    #[test]
    fn test_invalid_fold_change_threshold() {
        let t = create_three_group_table();
        assert_eq!(
            classify_significant(&t, &["A", "B"], 1.0, 95.0, None),
            Err(QcError::InvalidThreshold(1.0))
        );
        assert!(matches!(
            classify_significant(&t, &["A", "B"], f64::NAN, 95.0, None),
            Err(QcError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_invalid_variance_percentile() {
        let t = create_three_group_table();
        assert_eq!(
            classify_significant(&t, &["A", "B"], 2.0, 0.0, None),
            Err(QcError::InvalidPercentile(0.0))
        );
        assert_eq!(
            classify_significant(&t, &["A", "B"], 2.0, 101.0, None),
            Err(QcError::InvalidPercentile(101.0))
        );
    }

    #[test]
    fn test_unmatched_group() {
        let t = create_three_group_table();
        assert_eq!(
            classify_significant(&t, &["A", "Z"], 2.0, 95.0, None),
            Err(QcError::NoMatchingColumns("Z".to_string()))
        );
    }
}
