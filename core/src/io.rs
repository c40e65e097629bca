//! CSV readers and writers.
//!
//! Column types are inferred on load: a column is numeric when every
//! non-empty cell parses as a finite number, text otherwise. Empty
//! cells load as unset in both cases.

use crate::{
    error::EtlResult,
    matrix::FeatureMatrix,
    normalize::coerce_numeric,
    table::{Column, Table},
    types::Label,
};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

pub fn read_csv(path: impl AsRef<Path>) -> EtlResult<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let table = read_csv_from(BufReader::new(file))?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_cols(),
        path.display()
    );
    Ok(table)
}

pub fn read_csv_from<R: Read>(reader: R) -> EtlResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for record in reader.records() {
        let record = record?;
        for (i, cells) in raw.iter_mut().enumerate() {
            let cell = record.get(i).unwrap_or("");
            cells.push(if cell.trim().is_empty() {
                None
            } else {
                Some(cell.to_string())
            });
        }
    }

    let mut table = Table::new();
    for (name, cells) in headers.into_iter().zip(raw) {
        table.push_column(name, infer_column(cells))?;
    }
    Ok(table)
}

fn infer_column(cells: Vec<Option<String>>) -> Column {
    let all_numeric = cells
        .iter()
        .flatten()
        .all(|cell| coerce_numeric(cell).is_some());
    if all_numeric {
        Column::Numeric(cells.iter().map(|c| c.as_deref().and_then(coerce_numeric)).collect())
    } else {
        Column::Text(cells)
    }
}

/// Header row of column names, then one row per record.
pub fn write_matrix_csv<W: Write>(matrix: &FeatureMatrix, writer: W) -> EtlResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(matrix.names())?;
    for row in 0..matrix.n_rows() {
        out.write_record(matrix.row(row).iter().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// `label` column, plus `sample_weight` when weights are present.
pub fn write_labels_csv<W: Write>(
    labels: &[Label],
    sample_weights: Option<&[f64]>,
    writer: W,
) -> EtlResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    match sample_weights {
        Some(weights) => {
            out.write_record(["label", "sample_weight"])?;
            for (label, weight) in labels.iter().zip(weights) {
                out.write_record([label.to_string(), weight.to_string()])?;
            }
        }
        None => {
            out.write_record(["label"])?;
            for label in labels {
                out.write_record([label.to_string()])?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
