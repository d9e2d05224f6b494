//! Pairwise fold change and technical variance between groups.
//!
//! For every unordered pair of groups (taken in sorted name order) and every
//! protein both groups share, the engine records
//!
//! * the mean of the two within-group sample variances, and
//! * `mean(second) / mean(first)`,
//!
//! where means and variances only look at observed (non-zero, finite)
//! replicates. A zero mean is replaced by `approx_zero` before dividing.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::data::model::{Group, is_observed};
use crate::error::{QcError, Result};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Ordered pair of group names. `first` is the fold-change denominator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupPair {
    pub first: String,
    pub second: String,
}

impl GroupPair {
    pub fn new(first: &str, second: &str) -> Self {
        GroupPair {
            first: first.to_string(),
            second: second.to_string(),
        }
    }
}

impl fmt::Display for GroupPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.first, self.second)
    }
}

/// `(group pair, protein)`.
pub type StatKey = (GroupPair, String);

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Fold change and averaged variance of one protein between two groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProteinStat {
    pub fold_change: f64,
    pub variance: f64,
}

/// Everything one engine run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseStatistics {
    /// Substitute used for zero means in this run.
    pub approx_zero: f64,
    pub fold_changes: BTreeMap<StatKey, f64>,
    pub variances: BTreeMap<StatKey, f64>,
}

impl PairwiseStatistics {
    /// Every group pair that produced at least one record.
    pub fn pairs(&self) -> Vec<GroupPair> {
        let mut pairs: Vec<GroupPair> = self.fold_changes.keys().map(|(p, _)| p.clone()).collect();
        pairs.dedup();
        pairs
    }

    pub fn get(&self, pair: &GroupPair, protein: &str) -> Option<ProteinStat> {
        let key = (pair.clone(), protein.to_string());
        Some(ProteinStat {
            fold_change: *self.fold_changes.get(&key)?,
            variance: *self.variances.get(&key)?,
        })
    }

    /// Records of one pair, in protein order.
    pub fn pair_records<'a>(
        &'a self,
        pair: &'a GroupPair,
    ) -> impl Iterator<Item = (&'a str, ProteinStat)> + 'a {
        self.records()
            .filter(move |(p, _, _)| *p == pair)
            .map(|(_, protein, stat)| (protein, stat))
    }

    /// `(pair, protein, stat)` for every record.
    pub fn records(&self) -> impl Iterator<Item = (&GroupPair, &str, ProteinStat)> + '_ {
        self.fold_changes
            .iter()
            .zip(self.variances.values())
            .map(|((key, &fold_change), &variance)| {
                (
                    &key.0,
                    key.1.as_str(),
                    ProteinStat {
                        fold_change,
                        variance,
                    },
                )
            })
    }

    pub fn len(&self) -> usize {
        self.fold_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fold_changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// approxZero
// ---------------------------------------------------------------------------

/// Half the smallest observed value across all groups.
pub fn derive_approx_zero<'a, I>(groups: I) -> Result<f64>
where
    I: IntoIterator<Item = &'a Group>,
{
    let min = groups
        .into_iter()
        .filter_map(Group::min_nonzero)
        .min_by(f64::total_cmp)
        .ok_or(QcError::NoNonZeroValues)?;
    check_approx_zero(min / 2.0)
}

fn check_approx_zero(v: f64) -> Result<f64> {
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(QcError::DegenerateZero(v))
    }
}

// ---------------------------------------------------------------------------
// Per-row summaries
// ---------------------------------------------------------------------------

/// Mean and sample variance of the observed replicates of one row.
///
/// Mean is 0 with no observations; variance is 0 with fewer than two.
pub fn replicate_summary(values: &[f64]) -> (f64, f64) {
    let observed: Vec<f64> = values.iter().copied().filter(|&v| is_observed(v)).collect();
    let n = observed.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let ss: f64 = observed.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, ss / (n - 1) as f64)
}

fn protein_stat(first: &[f64], second: &[f64], approx_zero: f64) -> Result<ProteinStat> {
    let (mean_a, var_a) = replicate_summary(first);
    let (mean_b, var_b) = replicate_summary(second);

    let numerator = if mean_b == 0.0 { approx_zero } else { mean_b };
    let denominator = if mean_a == 0.0 { approx_zero } else { mean_a };
    if denominator == 0.0 {
        return Err(QcError::DegenerateZero(approx_zero));
    }

    Ok(ProteinStat {
        fold_change: numerator / denominator,
        variance: (var_a + var_b) / 2.0,
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Compare two groups over the proteins they share, with `first` as the
/// fold-change denominator.
pub fn compare_groups(
    first: &Group,
    second: &Group,
    approx_zero: f64,
) -> Result<BTreeMap<String, ProteinStat>> {
    let approx_zero = check_approx_zero(approx_zero)?;
    let mut out = BTreeMap::new();
    for (protein, a) in &first.rows {
        let Some(b) = second.get(protein) else {
            continue;
        };
        out.insert(protein.clone(), protein_stat(a, b, approx_zero)?);
    }
    Ok(out)
}

/// Run the engine over every unordered pair of `groups`.
///
/// Pairs are oriented by sorted group name, so `(A, B)` yields
/// `mean(B) / mean(A)`. When `approx_zero` is `None` it is derived once from
/// all groups and reused for every pair.
pub fn compute_statistics(
    groups: &BTreeMap<String, Group>,
    approx_zero: Option<f64>,
) -> Result<PairwiseStatistics> {
    if groups.len() < 2 {
        return Err(QcError::TooFewGroups(groups.len()));
    }

    let approx_zero = match approx_zero {
        Some(v) => check_approx_zero(v)?,
        None => derive_approx_zero(groups.values())?,
    };
    log::debug!("approxZero = {approx_zero}");

    let mut fold_changes = BTreeMap::new();
    let mut variances = BTreeMap::new();

    let entries: Vec<(&String, &Group)> = groups.iter().collect();
    for (i, (name_a, group_a)) in entries.iter().enumerate() {
        for (name_b, group_b) in &entries[i + 1..] {
            let pair = GroupPair::new(name_a, name_b);
            let stats = compare_groups(group_a, group_b, approx_zero)?;
            log::debug!("{pair}: {} shared proteins", stats.len());

            for (protein, stat) in stats {
                fold_changes.insert((pair.clone(), protein.clone()), stat.fold_change);
                variances.insert((pair.clone(), protein), stat.variance);
            }
        }
    }

    Ok(PairwiseStatistics {
        approx_zero,
        fold_changes,
        variances,
    })
}
