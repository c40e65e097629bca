//! Plan-driven feature selector and categorical encoder.
//!
//! RULES:
//!   - The requested list is untrusted. Absent names are dropped with
//!     one warning each, never fatal.
//!   - Output column order is the requested order, duplicates removed.
//!   - Text columns become integer codes assigned in lexical order of
//!     their distinct values; unset cells get code -1. The same category
//!     set therefore always gets the same codes.
//!   - Unset numeric cells enter the matrix as 0.

use crate::{
    features::{AVG_AMOUNT_SO_FAR, ROLLING_AMOUNT_SUM, ROLLING_TXN_COUNT},
    matrix::{ColumnKind, FeatureMatrix, MatrixColumn},
    table::{Column, Table},
    warning::{self, EtlWarning},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Code given to unset text cells.
pub const UNSET_CODE: i64 = -1;

/// Legacy feature names accepted in plans.
pub const FEATURE_ALIASES: [(&str, &str); 3] = [
    ("rolling_txn_count_24h", ROLLING_TXN_COUNT),
    ("rolling_amount_sum_24h", ROLLING_AMOUNT_SUM),
    ("avg_amt_per_customer", AVG_AMOUNT_SO_FAR),
];

/// Code table for one encoded column. A value's code is its index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCodes {
    pub column:     String,
    pub categories: Vec<String>,
}

impl CategoryCodes {
    pub fn code_of(&self, value: Option<&str>) -> i64 {
        value
            .and_then(|v| self.categories.binary_search_by(|c| c.as_str().cmp(v)).ok())
            .map_or(UNSET_CODE, |i| i as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub matrix:    FeatureMatrix,
    /// Requested names that were not in the schema, in request order.
    pub dropped:   Vec<String>,
    pub encodings: Vec<CategoryCodes>,
}

/// Resolve a legacy alias to its engineered column name.
pub fn canonical_feature_name(name: &str) -> &str {
    FEATURE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Map text cells to lexical-order codes.
pub fn encode_categories(column: &str, values: &[Option<String>]) -> (Vec<i64>, CategoryCodes) {
    let distinct: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
    let codes = CategoryCodes {
        column:     column.to_string(),
        categories: distinct.into_iter().map(str::to_string).collect(),
    };
    let encoded = values.iter().map(|v| codes.code_of(v.as_deref())).collect();
    (encoded, codes)
}

/// Prune `requested` to the table's schema and build the numeric matrix.
pub fn select_features(
    table: &Table,
    requested: &[String],
    warnings: &mut Vec<EtlWarning>,
) -> Selection {
    let mut matrix = FeatureMatrix::with_rows(table.n_rows());
    let mut dropped = Vec::new();
    let mut encodings = Vec::new();
    let mut taken: BTreeSet<&str> = BTreeSet::new();

    for name in requested {
        let resolved = if table.has_column(name) {
            name.as_str()
        } else {
            canonical_feature_name(name)
        };
        let Some(column) = table.column(resolved) else {
            warning::record(warnings, EtlWarning::PlanMismatch { feature: name.clone() });
            dropped.push(name.clone());
            continue;
        };
        if !taken.insert(resolved) {
            log::debug!("Feature '{name}' requested twice, keeping the first");
            continue;
        }

        let (kind, values) = match column {
            Column::Numeric(values) => {
                // Codes written by a cleaning rule stay out of the scaler.
                let kind = if table.is_encoded(resolved) {
                    ColumnKind::Encoded
                } else {
                    ColumnKind::Continuous
                };
                (kind, values.iter().map(|v| v.unwrap_or(0.0)).collect())
            }
            Column::Text(values) => {
                let (codes, table_of_codes) = encode_categories(resolved, values);
                warning::record(
                    warnings,
                    EtlWarning::EncodedColumn {
                        column:     resolved.to_string(),
                        categories: table_of_codes.categories.len(),
                    },
                );
                encodings.push(table_of_codes);
                (ColumnKind::Encoded, codes.into_iter().map(|c| c as f64).collect())
            }
        };
        matrix.push(MatrixColumn {
            name: resolved.to_string(),
            kind,
            values,
        });
    }

    log::info!("Selected {} of {} requested features", matrix.n_cols(), requested.len());
    Selection { matrix, dropped, encodings }
}
