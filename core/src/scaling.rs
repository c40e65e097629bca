//! Scaling Engine.
//!
//! Single fit-and-apply over the matrix passed in. Only continuous
//! columns are rescaled; encoded category codes pass through.

use crate::{
    matrix::{ColumnKind, FeatureMatrix},
    plan::ScalingMode,
};
use serde::Serialize;

/// Fitted affine transform for one column: `x' = (x - offset) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedScaler {
    pub column: String,
    pub offset: f64,
    pub scale:  f64,
}

impl FittedScaler {
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

/// Fit and apply the scaler to every continuous column.
pub fn apply_scaling(mut matrix: FeatureMatrix, mode: ScalingMode) -> (FeatureMatrix, Vec<FittedScaler>) {
    let fit: fn(&[f64]) -> (f64, f64) = match mode {
        ScalingMode::Standard => standard_params,
        ScalingMode::Minmax => min_max_params,
        ScalingMode::None => return (matrix, Vec::new()),
    };
    if matrix.n_rows() == 0 {
        return (matrix, Vec::new());
    }
    log::info!("Applying {} scaling to numeric features", mode.as_str());

    let mut fitted = Vec::new();
    for column in matrix.columns_mut() {
        if column.kind != ColumnKind::Continuous {
            continue;
        }
        let (offset, scale) = fit(&column.values);
        let scaler = FittedScaler {
            column: column.name.clone(),
            offset,
            scale,
        };
        for value in &mut column.values {
            *value = scaler.apply(*value);
        }
        fitted.push(scaler);
    }
    (matrix, fitted)
}

/// Mean and population standard deviation. A constant column keeps
/// scale 1 so it maps to all zeros.
fn standard_params(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    (mean, if std > 0.0 { std } else { 1.0 })
}

fn min_max_params(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    (min, if range > 0.0 { range } else { 1.0 })
}
