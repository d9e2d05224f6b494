//! Quality control for single-cell TMT proteomics quantification tables.
//!
//! - **data**: quantification table, column selection and loading
//! - **stats**: percentile thresholds, pairwise fold change / technical
//!   variance, and altered-protein classification
//! - **settings** / **export**: JSON settings, TSV / JSON results
//! - **app**, **ui**, **state**, **color**: the egui viewer
//!
//! ```no_run
//! use std::path::Path;
//! use tmt_qc::data::{filter::ColumnSelector, loader, model::MissingPolicy};
//! use tmt_qc::stats::classify::classify_significant;
//!
//! let table = loader::load_file(
//!     Path::new("proteinGroups.txt"),
//!     &ColumnSelector::default(),
//!     MissingPolicy::ZeroFill,
//! )
//! .unwrap();
//! let altered = classify_significant(&table, &["Hela", "Lung"], 2.0, 95.0, None).unwrap();
//! ```

pub mod app;
pub mod color;
pub mod data;
pub mod error;
pub mod export;
pub mod settings;
pub mod state;
pub mod stats;
pub mod ui;
