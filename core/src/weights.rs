//! Imbalance Weighting Engine.
//!
//! Read-only over the labels. Resampling strategies are the training
//! collaborator's job; for those this engine produces no weights.

use crate::{plan::ImbalanceStrategy, types::Label};
use std::collections::BTreeMap;

/// Balanced class weights, one per row:
/// `n_rows / (n_classes * count(class of row))`.
/// The weights sum to the row count.
pub fn balanced_sample_weights(labels: &[Label]) -> Vec<f64> {
    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_default() += 1;
    }
    let n_rows = labels.len() as f64;
    let n_classes = counts.len() as f64;
    labels
        .iter()
        .map(|label| n_rows / (n_classes * counts[label] as f64))
        .collect()
}

pub fn sample_weights(labels: &[Label], strategy: ImbalanceStrategy) -> Option<Vec<f64>> {
    match strategy {
        ImbalanceStrategy::ScalePosWeight => {
            let weights = balanced_sample_weights(labels);
            log::info!("Computed balanced sample weights for {} rows", weights.len());
            Some(weights)
        }
        ImbalanceStrategy::Smote | ImbalanceStrategy::Undersample | ImbalanceStrategy::None => {
            log::debug!(
                "No sample weights for strategy '{}', passed through to training",
                strategy.as_str()
            );
            None
        }
    }
}
