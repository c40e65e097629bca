//! Record Normalizer.
//!
//! Coerces the temporal index and the amount to numbers.
//! Malformed text becomes unset; it never raises. Only the
//! two named columns are touched.

use crate::{
    config::ColumnNames,
    error::EtlResult,
    table::{Column, Table},
    warning::{self, EtlWarning},
};
use std::borrow::Cow;

/// Parse one raw cell. Empty, non-numeric and non-finite text is unset.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a whole column. Returns the numeric values and the number of
/// non-empty cells that failed to parse.
pub fn coerce_column(column: &Column) -> (Vec<Option<f64>>, usize) {
    match column {
        Column::Numeric(values) => (values.clone(), 0),
        Column::Text(values) => {
            let mut malformed = 0;
            let coerced = values
                .iter()
                .map(|cell| {
                    let raw = cell.as_deref()?;
                    let parsed = coerce_numeric(raw);
                    if parsed.is_none() && !raw.trim().is_empty() {
                        malformed += 1;
                    }
                    parsed
                })
                .collect();
            (coerced, malformed)
        }
    }
}

/// Borrow a column as numbers, coercing text on the fly.
pub(crate) fn numeric_view(column: &Column) -> Cow<'_, [Option<f64>]> {
    match column {
        Column::Numeric(values) => Cow::Borrowed(values.as_slice()),
        Column::Text(_) => Cow::Owned(coerce_column(column).0),
    }
}

/// Coerce `name` in place, recording a warning when cells were lost.
pub(crate) fn coerce_in_place(
    table: &mut Table,
    name: &str,
    warnings: &mut Vec<EtlWarning>,
) -> EtlResult<()> {
    let Some(column) = table.column(name) else {
        return table.require("normalize", &[name]);
    };
    if column.is_numeric() {
        return Ok(());
    }
    let (values, malformed) = coerce_column(column);
    if malformed > 0 {
        warning::record(
            warnings,
            EtlWarning::ValueCoercion {
                column: name.to_string(),
                rows: malformed,
            },
        );
    }
    table.set_column(name, Column::Numeric(values))
}

/// Normalize the step and amount columns.
pub fn normalize_records(
    mut table: Table,
    columns: &ColumnNames,
    warnings: &mut Vec<EtlWarning>,
) -> EtlResult<Table> {
    table.require("normalize", &[columns.step.as_str(), columns.amount.as_str()])?;
    coerce_in_place(&mut table, &columns.step, warnings)?;
    coerce_in_place(&mut table, &columns.amount, warnings)?;
    log::debug!("Normalized {} records", table.n_rows());
    Ok(table)
}
