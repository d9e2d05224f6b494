/// Data layer: quantification table, column selection and loading.
///
/// Architecture:
/// ```text
///  .tsv / .txt / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  header predicates → value columns
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → QuantTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │  QuantTable   │  proteins × channels, split into Groups
///   └──────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
