//! Cleaning rule applier.
//!
//! Rules come from an external generator and are untrusted. Rules run
//! in the order given. A rule that cannot be parsed or applied is
//! reported and skipped; it never aborts the run.

use crate::{
    normalize::{coerce_column, coerce_numeric},
    select::encode_categories,
    table::{Column, Table},
    warning::{self, EtlWarning},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CleaningRule {
    /// Drop every row that has an unset cell.
    Dropna,
    /// Coerce one column to numeric, malformed cells become unset.
    HandleInconsistentDtypes { column: String },
    StripWhitespace {
        #[serde(default)]
        columns: Vec<String>,
    },
    ConvertToTitlecase {
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Replace text with lexical-order integer codes.
    EncodeCategoricals {
        #[serde(default)]
        columns: Vec<String>,
    },
    ReplaceMissingValue { column: String, value: Value },
}

impl CleaningRule {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Dropna => "dropna",
            Self::HandleInconsistentDtypes { .. } => "handle_inconsistent_dtypes",
            Self::StripWhitespace { .. } => "strip_whitespace",
            Self::ConvertToTitlecase { .. } => "convert_to_titlecase",
            Self::EncodeCategoricals { .. } => "encode_categoricals",
            Self::ReplaceMissingValue { .. } => "replace_missing_value",
        }
    }

    /// Parse a raw rule list. Entries that do not parse are skipped
    /// with a warning.
    pub fn parse_list(value: &Value, warnings: &mut Vec<EtlWarning>) -> Vec<CleaningRule> {
        let Some(items) = value.as_array() else {
            warning::record(warnings, EtlWarning::UnknownCleaningRule { rule: value.to_string() });
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match serde_json::from_value::<CleaningRule>(item.clone()) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    log::debug!("Rule {item} rejected: {e}");
                    warning::record(warnings, EtlWarning::UnknownCleaningRule { rule: item.to_string() });
                    None
                }
            })
            .collect()
    }
}

/// Apply `rules` in order.
pub fn apply_cleaning_rules(
    mut table: Table,
    rules: &[CleaningRule],
    warnings: &mut Vec<EtlWarning>,
) -> Table {
    for rule in rules {
        log::debug!("Applying cleaning rule '{}'", rule.action());
        match rule {
            CleaningRule::Dropna => drop_incomplete_rows(&mut table),
            CleaningRule::HandleInconsistentDtypes { column } => {
                let Some(current) = column_or_skip(&table, rule, column, warnings) else {
                    continue;
                };
                let (values, malformed) = coerce_column(current);
                if malformed > 0 {
                    warning::record(
                        warnings,
                        EtlWarning::ValueCoercion { column: column.clone(), rows: malformed },
                    );
                }
                replace(&mut table, column, Column::Numeric(values));
            }
            CleaningRule::StripWhitespace { columns } => {
                map_text(&mut table, rule, columns, warnings, |s| s.trim().to_string());
            }
            CleaningRule::ConvertToTitlecase { columns } => {
                map_text(&mut table, rule, columns, warnings, title_case);
            }
            CleaningRule::EncodeCategoricals { columns } => {
                for column in columns {
                    // Absent columns are skipped quietly, numeric ones are
                    // already encoded.
                    let Some(Column::Text(values)) = table.column(column) else {
                        continue;
                    };
                    let (codes, _) = encode_categories(column, values);
                    if let Err(e) = table.set_encoded_column(column, codes) {
                        log::error!("Cleaning produced a misaligned column: {e}");
                    }
                }
            }
            CleaningRule::ReplaceMissingValue { column, value } => {
                let Some(current) = column_or_skip(&table, rule, column, warnings) else {
                    continue;
                };
                match fill_missing(current.clone(), value) {
                    Some(filled) => replace(&mut table, column, filled),
                    None => warning::record(
                        warnings,
                        EtlWarning::SkippedCleaningRule {
                            action: rule.action().to_string(),
                            reason: format!("unsupported fill value {value}"),
                        },
                    ),
                }
            }
        }
    }
    log::info!("Cleaning complete: {} rules, {} rows remain", rules.len(), table.n_rows());
    table
}

fn column_or_skip<'t>(
    table: &'t Table,
    rule: &CleaningRule,
    column: &str,
    warnings: &mut Vec<EtlWarning>,
) -> Option<&'t Column> {
    let found = table.column(column);
    if found.is_none() {
        warning::record(
            warnings,
            EtlWarning::SkippedCleaningRule {
                action: rule.action().to_string(),
                reason: format!("column '{column}' not found"),
            },
        );
    }
    found
}

fn replace(table: &mut Table, name: &str, column: Column) {
    // Same length as the column it replaces, so set_column cannot fail.
    if let Err(e) = table.set_column(name, column) {
        log::error!("Cleaning produced a misaligned column: {e}");
    }
}

fn drop_incomplete_rows(table: &mut Table) {
    let keep: Vec<bool> = (0..table.n_rows())
        .map(|row| table.iter().all(|(_, col)| !col.is_unset(row)))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    table.retain_rows(&keep);
    log::debug!("dropna removed {dropped} rows");
}

fn map_text(
    table: &mut Table,
    rule: &CleaningRule,
    columns: &[String],
    warnings: &mut Vec<EtlWarning>,
    f: impl Fn(&str) -> String,
) {
    for name in columns {
        if column_or_skip(table, rule, name, warnings).is_none() {
            continue;
        }
        if let Some(Column::Text(values)) = table.column_mut(name) {
            for value in values.iter_mut().flatten() {
                *value = f(value);
            }
        }
    }
}

fn fill_missing(column: Column, value: &Value) -> Option<Column> {
    let fill_number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => coerce_numeric(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => return None,
    };
    let fill_text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match (column, fill_number) {
        (Column::Numeric(values), Some(n)) => {
            Some(Column::Numeric(values.into_iter().map(|v| v.or(Some(n))).collect()))
        }
        (column, _) => match column.into_text() {
            Column::Text(values) => Some(Column::Text(
                values.into_iter().map(|v| v.or_else(|| Some(fill_text.clone()))).collect(),
            )),
            Column::Numeric(_) => None,
        },
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
