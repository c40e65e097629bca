//! The ETL orchestrator.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Cleaning rules          (only when rules were supplied)
//!   1. Record normalizer       step, amount -> numeric
//!   2. Temporal feature engine five per-customer features
//!   3. Selector / encoder      plan features -> numeric matrix
//!   4. Scaling engine          plan.scaling
//!   5. Weighting engine        plan.imbalance_strategy
//!
//! RULES:
//!   - One deterministic pass per invocation. No retries.
//!   - The only fatal error is a missing required raw column, raised
//!     before any output exists.
//!   - Every recovered condition is returned in `EtlOutput::warnings`.
//!   - Nothing survives between runs.

use crate::{
    cleaning::{apply_cleaning_rules, CleaningRule},
    config::EtlConfig,
    error::{EtlError, EtlResult},
    features::TemporalFeatureEngine,
    matrix::FeatureMatrix,
    normalize::{coerce_column, normalize_records},
    plan::FeaturePlan,
    provider::PlanProvider,
    scaling::{apply_scaling, FittedScaler},
    select::{select_features, CategoryCodes},
    table::Table,
    types::Label,
    warning::{self, EtlWarning},
    weights,
};
use serde::Serialize;
use serde_json::Value;

/// Everything handed to the training collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtlOutput {
    pub matrix:         FeatureMatrix,
    pub labels:         Vec<Label>,
    pub sample_weights: Option<Vec<f64>>,
    /// The validated plan the run executed. Model name and imbalance
    /// strategy are passed through for the training step.
    pub plan:           FeaturePlan,
    pub dropped:        Vec<String>,
    pub encodings:      Vec<CategoryCodes>,
    pub scalers:        Vec<FittedScaler>,
    pub warnings:       Vec<EtlWarning>,
}

pub struct EtlPipeline {
    config:         EtlConfig,
    engine:         TemporalFeatureEngine,
    cleaning_rules: Vec<CleaningRule>,
    /// Rules rejected at parse time, reported with every run.
    rule_warnings:  Vec<EtlWarning>,
}

impl EtlPipeline {
    /// Fails when the config does not pass `EtlConfig::validate`.
    pub fn new(config: EtlConfig) -> EtlResult<Self> {
        config.validate()?;
        Ok(Self {
            engine:         TemporalFeatureEngine::new(&config),
            cleaning_rules: Vec::new(),
            rule_warnings:  Vec::new(),
            config,
        })
    }

    /// Run these cleaning rules before normalization.
    pub fn with_cleaning_rules(mut self, rules: Vec<CleaningRule>) -> Self {
        self.cleaning_rules = rules;
        self.rule_warnings.clear();
        self
    }

    /// Parse an untrusted rule list. Rejected entries are skipped and
    /// reported in the warnings of every run.
    pub fn with_raw_cleaning_rules(mut self, rules: &Value) -> Self {
        let mut warnings = Vec::new();
        self.cleaning_rules = CleaningRule::parse_list(rules, &mut warnings);
        self.rule_warnings = warnings;
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run with a raw, untrusted JSON plan.
    pub fn run_raw(&self, table: Table, plan: &Value) -> EtlResult<EtlOutput> {
        let mut warnings = self.rule_warnings.clone();
        let plan = FeaturePlan::from_value(plan, &mut warnings);
        self.execute(table, plan, warnings)
    }

    /// Run with a plan obtained from `provider`. The provider sees the
    /// schema of the cleaned table.
    pub fn run_with_provider(
        &self,
        table: Table,
        provider: &dyn PlanProvider,
    ) -> EtlResult<EtlOutput> {
        let mut warnings = self.rule_warnings.clone();
        let table = self.clean(table, &mut warnings);
        let raw = provider.provide(&table.schema_summary())?;
        log::info!("Plan received from provider '{}'", provider.name());
        let plan = FeaturePlan::from_value(&raw, &mut warnings);
        self.process(table, plan, warnings)
    }

    /// Run with an already validated plan.
    pub fn run(&self, table: Table, plan: &FeaturePlan) -> EtlResult<EtlOutput> {
        self.execute(table, plan.clone(), self.rule_warnings.clone())
    }

    fn execute(
        &self,
        table: Table,
        plan: FeaturePlan,
        mut warnings: Vec<EtlWarning>,
    ) -> EtlResult<EtlOutput> {
        let table = self.clean(table, &mut warnings);
        self.process(table, plan, warnings)
    }

    fn clean(&self, table: Table, warnings: &mut Vec<EtlWarning>) -> Table {
        if self.cleaning_rules.is_empty() {
            return table;
        }
        apply_cleaning_rules(table, &self.cleaning_rules, warnings)
    }

    fn process(
        &self,
        table: Table,
        plan: FeaturePlan,
        mut warnings: Vec<EtlWarning>,
    ) -> EtlResult<EtlOutput> {
        let columns = &self.config.columns;
        log::info!(
            "ETL run: {} rows, {} plan features, scaling={}, imbalance={}",
            table.n_rows(),
            plan.features.len(),
            plan.scaling.as_str(),
            plan.imbalance_strategy.as_str()
        );

        // Fail before any work when the raw schema is incomplete.
        table.require("etl", &columns.required())?;

        // 1. Normalize
        let table = normalize_records(table, columns, &mut warnings)?;

        // 2. Engineer
        let table = self.engine.engineer(table)?;

        // 3. Select and encode
        let selection = select_features(&table, &plan.features, &mut warnings);

        // 4. Scale
        let (matrix, scalers) = apply_scaling(selection.matrix, plan.scaling);

        // 5. Labels and weights
        let labels = extract_labels(&table, &columns.label, &mut warnings)?;
        let sample_weights = weights::sample_weights(&labels, plan.imbalance_strategy);

        let (rows, cols) = matrix.shape();
        log::info!("Final shape: ({rows}, {cols}), {} warning(s)", warnings.len());

        Ok(EtlOutput {
            matrix,
            labels,
            sample_weights,
            plan,
            dropped: selection.dropped,
            encodings: selection.encodings,
            scalers,
            warnings,
        })
    }
}

/// Label column cast to integer. Unset and malformed cells become 0.
fn extract_labels(
    table: &Table,
    name: &str,
    warnings: &mut Vec<EtlWarning>,
) -> EtlResult<Vec<Label>> {
    let column = table.column(name).ok_or_else(|| EtlError::Schema {
        stage:   "labels",
        missing: vec![name.to_string()],
    })?;
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
    Ok(values.into_iter().map(|v| v.unwrap_or(0.0) as Label).collect())
}
