//! Shared primitive types used across the entire pipeline.

/// Ordinal time unit of the ledger. Only its ordering is meaningful.
pub type Step = f64;

/// Position of a row in the input record set.
/// Every derived value is written back to this position.
pub type RowIndex = usize;

/// Integer fraud label. 0 = legitimate, 1 = fraud.
pub type Label = i64;
