//! Recoverable conditions raised during a run.
//!
//! RULE: A warning never aborts the run. Every stage that recovers
//! from bad input records exactly one warning per condition and
//! carries on with a best-effort result.
//! Fatal conditions travel on the error path (see error.rs), never here.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EtlWarning {
    /// A plan feature is absent from the engineered schema and was dropped.
    PlanMismatch {
        feature: String,
    },
    /// A plan field had the wrong shape or an unknown value and was defaulted.
    PlanField {
        field: String,
        detail: String,
    },
    /// Non-numeric cells in a numeric column were coerced to unset.
    ValueCoercion {
        column: String,
        rows: usize,
    },
    /// A selected text column was mapped to integer codes.
    EncodedColumn {
        column: String,
        categories: usize,
    },
    /// A cleaning rule could not be parsed.
    UnknownCleaningRule {
        rule: String,
    },
    /// A well-formed cleaning rule could not be applied.
    SkippedCleaningRule {
        action: String,
        reason: String,
    },
}

impl fmt::Display for EtlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanMismatch { feature } => {
                write!(f, "plan feature '{feature}' is missing from the data, dropped")
            }
            Self::PlanField { field, detail } => {
                write!(f, "plan field '{field}': {detail}")
            }
            Self::ValueCoercion { column, rows } => {
                write!(f, "{rows} non-numeric value(s) in '{column}' coerced to unset")
            }
            Self::EncodedColumn { column, categories } => {
                write!(f, "encoding column '{column}' ({categories} categories) as it is still text")
            }
            Self::UnknownCleaningRule { rule } => {
                write!(f, "unknown cleaning rule: {rule}")
            }
            Self::SkippedCleaningRule { action, reason } => {
                write!(f, "cleaning rule '{action}' skipped: {reason}")
            }
        }
    }
}

/// Log a warning and append it to the run's warning list.
pub(crate) fn record(warnings: &mut Vec<EtlWarning>, warning: EtlWarning) {
    log::warn!("{warning}");
    warnings.push(warning);
}
