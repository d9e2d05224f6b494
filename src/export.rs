use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::stats::classify::{Classification, FlaggedRecord};
use crate::stats::engine::PairwiseStatistics;

// ---------------------------------------------------------------------------
// Pairwise statistics → TSV
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatRow<'a> {
    first: &'a str,
    second: &'a str,
    protein: &'a str,
    fold_change: f64,
    log2_fold_change: f64,
    variance: f64,
}

/// One row per `(pair, protein)` record.
pub fn write_statistics(path: &Path, stats: &PairwiseStatistics) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    for (pair, protein, stat) in stats.records() {
        writer
            .serialize(StatRow {
                first: &pair.first,
                second: &pair.second,
                protein,
                fold_change: stat.fold_change,
                log2_fold_change: stat.fold_change.log2(),
                variance: stat.variance,
            })
            .context("writing statistics row")?;
    }
    writer.flush().context("flushing statistics")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification → JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Report<'a> {
    fold_change_threshold: f64,
    variance_percentile: f64,
    /// `null` when the cutoff was disabled.
    variance_threshold: Option<f64>,
    approx_zero: f64,
    proteins: Vec<String>,
    records: &'a [FlaggedRecord],
}

pub fn write_classification(path: &Path, classification: &Classification) -> Result<()> {
    let report = Report {
        fold_change_threshold: classification.fold_change_threshold,
        variance_percentile: classification.variance_percentile,
        variance_threshold: Some(classification.variance_threshold).filter(|v| v.is_finite()),
        approx_zero: classification.statistics.approx_zero,
        proteins: classification.proteins(),
        records: &classification.flagged,
    };
    let text = serde_json::to_string_pretty(&report).context("serialising classification")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
