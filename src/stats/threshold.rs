//! Order-statistic percentile thresholds.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::is_observed;
use crate::error::{QcError, Result};

/// Threshold pair for one percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub with_zeros: f64,
    pub without_zeros: f64,
}

/// Percentile → thresholds. Keys are the requested percentiles as given,
/// stored by their bit pattern so `f64` can key a sorted map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    entries: BTreeMap<PercentileKey, Threshold>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PercentileKey(u64);

impl PercentileKey {
    // Monotone for the positive percentiles accepted here.
    fn new(p: f64) -> Self {
        PercentileKey(p.to_bits())
    }
}

impl Thresholds {
    pub fn get(&self, percentile: f64) -> Option<Threshold> {
        self.entries.get(&PercentileKey::new(percentile)).copied()
    }

    pub fn with_zeros(&self, percentile: f64) -> Option<f64> {
        self.get(percentile).map(|t| t.with_zeros)
    }

    pub fn without_zeros(&self, percentile: f64) -> Option<f64> {
        self.get(percentile).map(|t| t.without_zeros)
    }

    /// `(percentile, threshold)` in ascending percentile order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, Threshold)> + '_ {
        self.entries.iter().map(|(k, t)| (f64::from_bits(k.0), *t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reject percentiles outside `(0, 100]`.
pub fn validate_percentile(p: f64) -> Result<()> {
    if p > 0.0 && p <= 100.0 {
        Ok(())
    } else {
        Err(QcError::InvalidPercentile(p))
    }
}

/// Value at percentile `p` of a descending-sorted slice.
///
/// Picks the observation at rank `ceil(n * (100 - p) / 100)`; a rank of
/// `n` is clamped to the last element. Never interpolates.
pub fn order_statistic(sorted_desc: &[f64], p: f64) -> Result<f64> {
    validate_percentile(p)?;
    let n = sorted_desc.len();
    if n == 0 {
        return Err(QcError::EmptySequence(format!(
            "cannot take the {p}% threshold of an empty sequence"
        )));
    }
    let frac = (100.0 - p) / 100.0;
    let rank = ((n as f64) * frac).ceil() as usize;
    Ok(sorted_desc[rank.min(n - 1)])
}

/// Sort finite values in descending order. Non-finite entries (missing
/// cells kept as `NaN`) are dropped.
pub fn sorted_descending(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// Compute the with-zeros and without-zeros threshold for every percentile.
///
/// Fails with [`QcError::EmptySequence`] when either variant has nothing to
/// rank, including a sequence made only of zeros.
pub fn compute_thresholds(values: &[f64], percentiles: &[f64]) -> Result<Thresholds> {
    let all = sorted_descending(values);
    let nonzero: Vec<f64> = all.iter().copied().filter(|&v| is_observed(v)).collect();

    let mut entries = BTreeMap::new();
    for &p in percentiles {
        let with_zeros = order_statistic(&all, p)?;
        let without_zeros = order_statistic(&nonzero, p).map_err(|e| match e {
            QcError::EmptySequence(_) => QcError::EmptySequence(format!(
                "no non-zero values to take the {p}% threshold of"
            )),
            other => other,
        })?;
        log::debug!("{p}% threshold: {with_zeros} (ignoring zeros: {without_zeros})");
        entries.insert(
            PercentileKey::new(p),
            Threshold {
                with_zeros,
                without_zeros,
            },
        );
    }

    Ok(Thresholds { entries })
}
