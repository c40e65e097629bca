//! Feature ETL for a per-transaction fraud ledger.
//!
//! Takes raw ledger records and an untrusted plan, derives
//! customer-relative temporal features and assembles the
//! `(FeatureMatrix, Labels, SampleWeights?)` triple consumed by a
//! downstream training step. See `etl` for the stage order.

pub mod cleaning;
pub mod config;
pub mod error;
pub mod etl;
pub mod features;
pub mod io;
pub mod matrix;
pub mod normalize;
pub mod plan;
pub mod provider;
pub mod scaling;
pub mod select;
pub mod table;
pub mod types;
pub mod warning;
pub mod weights;
