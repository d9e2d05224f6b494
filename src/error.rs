//! Error types for the statistics core.

use thiserror::Error;

/// Validation failures raised by threshold computation, the fold-change /
/// variance engine and significance classification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QcError {
    #[error("Empty sequence: {0}")]
    EmptySequence(String),

    #[error("No non-zero values in any group; approxZero cannot be derived")]
    NoNonZeroValues,

    #[error("approxZero resolved to {0}; fold change would divide by zero")]
    DegenerateZero(f64),

    #[error("Fold-change threshold must be greater than 1, got {0}")]
    InvalidThreshold(f64),

    #[error("Percentile must lie in (0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("No columns match group '{0}'")]
    NoMatchingColumns(String),

    #[error("At least two groups are required, got {0}")]
    TooFewGroups(usize),
}

/// Result type alias for statistics operations.
pub type Result<T> = std::result::Result<T, QcError>;
