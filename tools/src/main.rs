//! etl-runner: headless feature ETL over a transaction ledger.
//!
//! Usage:
//!   etl-runner --input data/banksim_cleaned.csv --plan plan.json --out outputs
//!   etl-runner --input data/banksim.csv --rules rules.json --config etl.json
//!
//! Without --plan the built-in fallback plan is used.

use anyhow::{Context, Result};
use ledger_etl_core::{
    config::EtlConfig,
    etl::{EtlOutput, EtlPipeline},
    io::{read_csv, write_labels_csv, write_matrix_csv},
    plan::FeaturePlan,
    provider::{FallbackPlanProvider, JsonFilePlanProvider, PlanProvider, StaticPlanProvider},
    warning::EtlWarning,
};
use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

#[derive(serde::Serialize)]
struct RunSummary<'a> {
    run_id:        String,
    started_at:    chrono::DateTime<chrono::Utc>,
    input:         &'a str,
    rows:          usize,
    features_used: Vec<&'a str>,
    dropped:       &'a [String],
    model:         &'a str,
    scaling:       &'a str,
    imbalance:     &'a str,
    weighted:      bool,
    warnings:      &'a [EtlWarning],
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = arg_value(&args, "--input").unwrap_or("data/banksim_cleaned.csv");
    let plan_path = arg_value(&args, "--plan");
    let rules_path = arg_value(&args, "--rules");
    let config_path = arg_value(&args, "--config");
    let out_dir = arg_value(&args, "--out").unwrap_or("outputs");

    let run_id = format!("etl-{}", uuid::Uuid::new_v4());
    let started_at = chrono::Utc::now();

    println!("Ledger ETL - etl-runner");
    println!("  run_id:   {run_id}");
    println!("  input:    {input}");
    println!("  plan:     {}", plan_path.unwrap_or("(fallback)"));
    println!("  rules:    {}", rules_path.unwrap_or("(none)"));
    println!("  out:      {out_dir}");
    println!();

    let config = match config_path {
        Some(path) => EtlConfig::load(path)?,
        None => EtlConfig::default(),
    };

    let mut pipeline = EtlPipeline::new(config)?;
    if let Some(path) = rules_path {
        pipeline = pipeline.with_raw_cleaning_rules(&load_rules(path)?);
    }

    let table = read_csv(input).with_context(|| format!("Cannot load ledger {input}"))?;

    let provider: Box<dyn PlanProvider> = match plan_path {
        Some(path) => Box::new(FallbackPlanProvider::new(JsonFilePlanProvider::new(path))?),
        None => Box::new(StaticPlanProvider::from_plan(&FeaturePlan::fallback())?),
    };
    let output = pipeline.run_with_provider(table, provider.as_ref())?;

    write_outputs(Path::new(out_dir), &output)?;

    let summary = RunSummary {
        run_id,
        started_at,
        input,
        rows:          output.matrix.n_rows(),
        features_used: output.matrix.names(),
        dropped:       &output.dropped,
        model:         output.plan.model.as_str(),
        scaling:       output.plan.scaling.as_str(),
        imbalance:     output.plan.imbalance_strategy.as_str(),
        weighted:      output.sample_weights.is_some(),
        warnings:      &output.warnings,
    };
    let summary_path = Path::new(out_dir).join("run_summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

    print_summary(&summary);
    Ok(())
}

/// Raw rule list. Entries are validated by the pipeline, which reports
/// rejected rules in the run warnings.
fn load_rules(path: &str) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let value = serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {path}"))?;
    log::info!("Loaded cleaning rules from {path}");
    Ok(value)
}

fn write_outputs(out_dir: &Path, output: &EtlOutput) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let features = File::create(out_dir.join("features.csv"))?;
    write_matrix_csv(&output.matrix, BufWriter::new(features))?;
    let labels = File::create(out_dir.join("labels.csv"))?;
    write_labels_csv(&output.labels, output.sample_weights.as_deref(), BufWriter::new(labels))?;
    Ok(())
}

fn print_summary(summary: &RunSummary<'_>) {
    println!("=== RUN SUMMARY ===");
    println!("  rows:           {}", summary.rows);
    println!("  features:       {}", summary.features_used.join(", "));
    if !summary.dropped.is_empty() {
        println!("  dropped:        {}", summary.dropped.join(", "));
    }
    println!("  model:          {}", summary.model);
    println!("  scaling:        {}", summary.scaling);
    println!("  imbalance:      {}", summary.imbalance);
    println!("  sample weights: {}", if summary.weighted { "yes" } else { "no" });
    println!("  warnings:       {}", summary.warnings.len());
    for warning in summary.warnings {
        println!("    - {warning}");
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
