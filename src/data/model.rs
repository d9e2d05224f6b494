use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::QcError;

// ---------------------------------------------------------------------------
// MissingPolicy – how empty cells enter the table
// ---------------------------------------------------------------------------

/// What to store for a cell the quantification file left empty.
///
/// `ZeroFill` keeps the historical behaviour where "not measured" and
/// "measured at zero" are the same thing. `KeepMissing` stores `NaN`; every
/// computation skips non-finite entries exactly as it skips zeros, and the
/// scatter grid omits them instead of drawing them on the axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingPolicy {
    #[default]
    ZeroFill,
    KeepMissing,
}

impl MissingPolicy {
    /// Value stored for a missing cell.
    pub fn fill(self) -> f64 {
        match self {
            MissingPolicy::ZeroFill => 0.0,
            MissingPolicy::KeepMissing => f64::NAN,
        }
    }

    /// Resolve a parsed cell.
    pub fn resolve(self, value: Option<f64>) -> f64 {
        match value {
            Some(v) if !v.is_nan() => v,
            _ => self.fill(),
        }
    }
}

impl fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPolicy::ZeroFill => write!(f, "missing → 0"),
            MissingPolicy::KeepMissing => write!(f, "keep missing"),
        }
    }
}

/// True for an abundance that counts as an actual observation.
pub fn is_observed(v: f64) -> bool {
    v.is_finite() && v != 0.0
}

// ---------------------------------------------------------------------------
// QuantTable – proteins × channels
// ---------------------------------------------------------------------------

/// A protein abundance table: one row per protein, one column per
/// sample/replicate channel.
#[derive(Debug, Clone)]
pub struct QuantTable {
    /// Row index (unique protein identifiers), in file order.
    pub proteins: Vec<String>,
    /// Channel names, in file order.
    pub columns: Vec<String>,
    /// Row-major values, `values[row][col]`.
    pub values: Vec<Vec<f64>>,
}

impl QuantTable {
    /// Build a table from `(protein, row values)` pairs.
    pub fn from_rows(columns: Vec<String>, rows: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut proteins = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());

        for (protein, row) in rows {
            if row.len() != columns.len() {
                bail!(
                    "Protein '{protein}' has {} values but the table has {} columns",
                    row.len(),
                    columns.len()
                );
            }
            if let Some((col, v)) = columns
                .iter()
                .zip(&row)
                .find(|&(_, &v)| v.is_infinite() || v < 0.0)
            {
                bail!("Protein '{protein}' has invalid abundance {v} in column '{col}'");
            }
            if !seen.insert(protein.clone()) {
                bail!("Duplicate protein identifier '{protein}'");
            }
            proteins.push(protein);
            values.push(row);
        }

        Ok(QuantTable {
            proteins,
            columns,
            values,
        })
    }

    /// Number of proteins.
    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    /// Whether the table has no proteins.
    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    /// Restrict the table to the channels whose name contains `name`.
    pub fn group(&self, name: &str) -> Result<Group, QcError> {
        let col_idx: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains(name))
            .map(|(i, _)| i)
            .collect();

        if col_idx.is_empty() {
            return Err(QcError::NoMatchingColumns(name.to_string()));
        }

        let columns = col_idx.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .proteins
            .iter()
            .zip(&self.values)
            .map(|(p, row)| (p.clone(), col_idx.iter().map(|&i| row[i]).collect()))
            .collect();

        Ok(Group::new(name, columns, rows))
    }

    /// Build every named group; keys come back sorted, which fixes the
    /// orientation of each group pair.
    pub fn groups<S: AsRef<str>>(&self, specs: &[S]) -> Result<BTreeMap<String, Group>, QcError> {
        specs
            .iter()
            .map(|s| {
                let name = s.as_ref();
                self.group(name).map(|g| (name.to_string(), g))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Group – a named subset of channels
// ---------------------------------------------------------------------------

/// A cell type / condition: the same proteins restricted to its channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub columns: Vec<String>,
    /// protein → replicate values (same order as `columns`).
    pub rows: BTreeMap<String, Vec<f64>>,
}

impl Group {
    pub fn new(name: &str, columns: Vec<String>, rows: BTreeMap<String, Vec<f64>>) -> Self {
        Group {
            name: name.to_string(),
            columns,
            rows,
        }
    }

    pub fn get(&self, protein: &str) -> Option<&[f64]> {
        self.rows.get(protein).map(Vec::as_slice)
    }

    /// Smallest observed (finite, non-zero) value in the group.
    pub fn min_nonzero(&self) -> Option<f64> {
        self.rows
            .values()
            .flatten()
            .copied()
            .filter(|&v| is_observed(v))
            .min_by(f64::total_cmp)
    }
}
