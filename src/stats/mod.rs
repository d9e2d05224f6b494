/// Statistics core: thresholds, pairwise fold change / variance, and
/// significance classification.
///
/// ```text
///   QuantTable ──groups()──► BTreeMap<name, Group>
///                                   │
///                                   ▼
///                           ┌──────────────┐
///                           │    engine     │  fold change + variance per (pair, protein)
///                           └──────────────┘
///                                   │
///                                   ▼
///                           ┌──────────────┐
///                           │   classify    │  variance cutoff via threshold
///                           └──────────────┘
///                                   │
///                                   ▼
///                         flagged protein ids
/// ```
pub mod classify;
pub mod engine;
pub mod threshold;
