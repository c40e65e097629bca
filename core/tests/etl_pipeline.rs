//! End-to-end pipeline tests: plan pruning, encoding, scaling, weights,
//! cleaning, and the fatal schema path.

use ledger_etl_core::{
    cleaning::CleaningRule,
    config::{EtlConfig, RecentWindow},
    error::EtlError,
    etl::{EtlOutput, EtlPipeline},
    io::read_csv_from,
    matrix::ColumnKind,
    plan::{FeaturePlan, ImbalanceStrategy, ModelKind, ScalingMode},
    provider::{FallbackPlanProvider, JsonFilePlanProvider, StaticPlanProvider},
    table::Table,
    warning::EtlWarning,
};
use serde_json::json;

const LEDGER: &str = "\
customer,age,step,amount,merchant,category,fraud
C1,3,1,10.0,M1,food,0
C2,5,1,250.0,M7,travel,1
C1,3,2,20.0,M2,food,0
C1,3,3,10.0,M1,health,0
C2,5,2,90.0,M7,misc_net,0
C1,3,4,10.0,M3,food,0
C3,U,1,35.5,M4,transport,0
C1,3,5,50.0,M1,shopping_net,0
";

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ledger() -> Table {
    read_csv_from(LEDGER.as_bytes()).expect("fixture parses")
}

fn plan(features: &[&str], scaling: ScalingMode, imbalance: ImbalanceStrategy) -> FeaturePlan {
    FeaturePlan {
        features:           features.iter().map(|f| f.to_string()).collect(),
        model:              ModelKind::Xgboost,
        scaling,
        imbalance_strategy: imbalance,
    }
}

fn pipeline() -> EtlPipeline {
    EtlPipeline::new(EtlConfig::default_test()).expect("valid config")
}

fn run(features: &[&str], scaling: ScalingMode, imbalance: ImbalanceStrategy) -> EtlOutput {
    pipeline()
        .run(ledger(), &plan(features, scaling, imbalance))
        .expect("pipeline runs")
}

#[test]
fn absent_plan_features_are_dropped_with_a_warning() {
    init_logs();
    let out = run(&["amount", "ghost_feature"], ScalingMode::None, ImbalanceStrategy::None);

    assert_eq!(out.matrix.names(), vec!["amount"]);
    assert_eq!(out.matrix.shape(), (8, 1));
    assert_eq!(out.dropped, vec!["ghost_feature".to_string()]);
    assert!(
        out.warnings.contains(&EtlWarning::PlanMismatch { feature: "ghost_feature".into() }),
        "expected a mismatch warning, got {:?}",
        out.warnings
    );
}

#[test]
fn engineered_features_are_selectable_in_plan_order() {
    let out = run(
        &["rolling_txn_count", "amount", "avg_amount_so_far", "is_risky_category"],
        ScalingMode::None,
        ImbalanceStrategy::None,
    );
    assert_eq!(
        out.matrix.names(),
        vec!["rolling_txn_count", "amount", "avg_amount_so_far", "is_risky_category"]
    );
    // Row 7 is C1's fifth transaction: amounts 10, 20, 10, 10, 50.
    assert_eq!(out.matrix.row(7), vec![5.0, 50.0, 20.0, 1.0]);
    // Row 1 is C2's first transaction.
    assert_eq!(out.matrix.row(1), vec![1.0, 250.0, 250.0, 1.0]);
}

#[test]
fn legacy_feature_names_resolve_to_engineered_columns() {
    let out = run(
        &["rolling_txn_count_24h", "avg_amt_per_customer"],
        ScalingMode::None,
        ImbalanceStrategy::None,
    );
    assert_eq!(out.matrix.names(), vec!["rolling_txn_count", "avg_amount_so_far"]);
    assert!(out.dropped.is_empty());
}

#[test]
fn repeated_runs_are_identical() {
    let features = ["amount", "category", "rolling_amount_sum", "unique_merchants_so_far"];
    let first = run(&features, ScalingMode::Standard, ImbalanceStrategy::ScalePosWeight);
    let second = run(&features, ScalingMode::Standard, ImbalanceStrategy::ScalePosWeight);
    assert_eq!(first, second);
}

#[test]
fn balanced_weights_favour_the_minority_class() {
    let table = read_csv_from(
        "customer,step,amount,merchant,category,fraud\n\
         C1,1,1,M1,food,0\nC1,2,1,M1,food,0\nC2,1,1,M1,food,0\nC2,2,1,M1,food,1\n"
            .as_bytes(),
    )
    .unwrap();
    let out = pipeline()
        .run(table, &plan(&["amount"], ScalingMode::None, ImbalanceStrategy::ScalePosWeight))
        .unwrap();

    assert_eq!(out.labels, vec![0, 0, 0, 1]);
    let weights = out.sample_weights.expect("weights for scale_pos_weight");
    assert_eq!(weights.len(), 4);
    assert!((weights[3] - 3.0 * weights[0]).abs() < 1e-12, "weights: {weights:?}");
    assert!((weights.iter().sum::<f64>() - 4.0).abs() < 1e-12);
}

#[test]
fn resampling_strategies_produce_no_weights() {
    for strategy in [ImbalanceStrategy::Smote, ImbalanceStrategy::Undersample, ImbalanceStrategy::None] {
        let out = run(&["amount"], ScalingMode::None, strategy);
        assert!(out.sample_weights.is_none(), "{strategy:?} should not weight");
        assert_eq!(out.plan.imbalance_strategy, strategy);
    }
}

#[test]
fn standard_scaling_centres_continuous_columns() {
    let out = run(&["amount", "rolling_amount_sum"], ScalingMode::Standard, ImbalanceStrategy::None);
    for column in out.matrix.columns() {
        let n = column.values.len() as f64;
        let mean = column.values.iter().sum::<f64>() / n;
        let var = column.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-9, "{} mean {mean}", column.name);
        assert!((var - 1.0).abs() < 1e-9, "{} variance {var}", column.name);
    }
    assert_eq!(out.scalers.len(), 2);
}

#[test]
fn minmax_scaling_maps_into_unit_interval() {
    let out = run(&["amount", "avg_amount_so_far"], ScalingMode::Minmax, ImbalanceStrategy::None);
    for column in out.matrix.columns() {
        let min = column.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = column.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(min.abs() < 1e-12, "{} min {min}", column.name);
        assert!((max - 1.0).abs() < 1e-12, "{} max {max}", column.name);
    }
}

#[test]
fn text_columns_are_encoded_lexically_and_left_unscaled() {
    let out = run(&["category", "amount"], ScalingMode::Standard, ImbalanceStrategy::None);

    let category = &out.matrix.columns()[0];
    assert_eq!(category.kind, ColumnKind::Encoded);
    assert_eq!(out.encodings.len(), 1);
    assert_eq!(
        out.encodings[0].categories,
        vec!["food", "health", "misc_net", "shopping_net", "transport", "travel"]
    );
    // food, travel, food, health, misc_net, food, transport, shopping_net
    assert_eq!(category.values, vec![0.0, 5.0, 0.0, 1.0, 2.0, 0.0, 4.0, 3.0]);
    assert_eq!(out.matrix.columns()[1].kind, ColumnKind::Continuous);
    assert_eq!(out.scalers.len(), 1);
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, EtlWarning::EncodedColumn { column, categories: 6 } if column == "category")));
}

#[test]
fn mixed_age_column_is_encoded() {
    // The "U" cell keeps age as text, as in the raw BankSim export.
    let out = run(&["age"], ScalingMode::None, ImbalanceStrategy::None);
    assert_eq!(out.encodings[0].categories, vec!["3", "5", "U"]);
    assert_eq!(out.matrix.column("age").unwrap(), &[0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
}

#[test]
fn malformed_raw_plan_fields_fall_back_to_defaults() {
    let raw = json!({
        "features": ["amount", 7, "category"],
        "model": "catboost",
        "scaling": "log",
        "imbalance_strategy": ["smote"],
    });
    let out = pipeline().run_raw(ledger(), &raw).unwrap();

    assert_eq!(out.plan.features, vec!["amount", "category"]);
    assert_eq!(out.plan.model, ModelKind::Other("catboost".into()));
    assert_eq!(out.plan.scaling, ScalingMode::None);
    assert_eq!(out.plan.imbalance_strategy, ImbalanceStrategy::None);
    assert!(out.sample_weights.is_none());
    assert!(out.scalers.is_empty());

    let plan_fields: Vec<&str> = out
        .warnings
        .iter()
        .filter_map(|w| match w {
            EtlWarning::PlanField { field, .. } => Some(field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(plan_fields, vec!["features", "scaling", "imbalance_strategy"]);
}

#[test]
fn non_object_plan_yields_empty_matrix_but_full_labels() {
    let out = pipeline().run_raw(ledger(), &json!("amount,category")).unwrap();
    assert_eq!(out.matrix.shape(), (8, 0));
    assert_eq!(out.labels.len(), 8);
}

#[test]
fn provider_failure_uses_the_fallback_plan() {
    init_logs();
    let provider = FallbackPlanProvider::new(JsonFilePlanProvider::new("/nonexistent/plan.json")).unwrap();
    let table = ledger().into_without("age");
    let out = pipeline().run_with_provider(table, &provider).unwrap();

    assert_eq!(out.plan, FeaturePlan::fallback());
    assert_eq!(out.matrix.names(), vec!["amount", "category"]);
    assert_eq!(out.dropped, vec!["age".to_string()]);
    assert!(out.sample_weights.is_some());
}

#[test]
fn static_provider_plan_is_validated_like_any_other() {
    let provider = StaticPlanProvider::new(json!({
        "features": ["unique_merchants_so_far"],
        "scaling": "min-max",
    }));
    let out = pipeline().run_with_provider(ledger(), &provider).unwrap();
    assert_eq!(out.plan.scaling, ScalingMode::Minmax);
    assert_eq!(out.plan.model, ModelKind::Unspecified);
    assert_eq!(out.matrix.names(), vec!["unique_merchants_so_far"]);
}

#[test]
fn missing_label_column_is_fatal() {
    let table = ledger().into_without("fraud");
    let result = pipeline().run(table, &plan(&["amount"], ScalingMode::None, ImbalanceStrategy::None));
    match result {
        Err(EtlError::Schema { missing, .. }) => assert_eq!(missing, vec!["fraud"]),
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn malformed_amounts_are_coerced_with_a_warning() {
    let table = read_csv_from(
        "customer,step,amount,merchant,category,fraud\n\
         C1,1,10,M1,food,0\nC1,2,n/a,M1,food,0\nC1,3,20,M1,food,1\n"
            .as_bytes(),
    )
    .unwrap();
    let out = pipeline()
        .run(table, &plan(&["amount", "avg_amount_so_far"], ScalingMode::None, ImbalanceStrategy::None))
        .unwrap();

    assert!(out.warnings.contains(&EtlWarning::ValueCoercion { column: "amount".into(), rows: 1 }));
    assert_eq!(out.matrix.column("amount").unwrap(), &[10.0, 0.0, 20.0]);
    assert_eq!(out.matrix.column("avg_amount_so_far").unwrap(), &[10.0, 5.0, 10.0]);
}

#[test]
fn cleaning_rules_run_before_feature_engineering() {
    init_logs();
    let table = read_csv_from(
        "customer,step,amount,merchant,category,fraud\n\
         C1,1,10, M1,  TRAVEL ,0\nC1,2,,M2,food,0\nC1,3,30,M1 ,food,1\n"
            .as_bytes(),
    )
    .unwrap();
    let mut rule_warnings = Vec::new();
    let rules = CleaningRule::parse_list(
        &json!([
            {"action": "strip_whitespace", "columns": ["merchant", "category"]},
            {"action": "teleport"},
            {"action": "replace_missing_value", "column": "amount", "value": 20},
            {"action": "convert_to_titlecase", "columns": ["nickname"]},
        ]),
        &mut rule_warnings,
    );
    assert_eq!(rules.len(), 3);
    assert_eq!(rule_warnings.len(), 1);

    let pipeline = pipeline().with_cleaning_rules(rules);
    let out = pipeline
        .run(
            table,
            &plan(&["amount", "unique_merchants_so_far", "category"], ScalingMode::None, ImbalanceStrategy::None),
        )
        .unwrap();

    assert_eq!(out.matrix.column("amount").unwrap(), &[10.0, 20.0, 30.0]);
    // " M1" and "M1 " collapse to the same merchant once stripped.
    assert_eq!(out.matrix.column("unique_merchants_so_far").unwrap(), &[1.0, 2.0, 2.0]);
    assert_eq!(out.encodings[0].categories, vec!["TRAVEL", "food"]);
    assert!(out.warnings.iter().any(|w| matches!(
        w,
        EtlWarning::SkippedCleaningRule { action, .. } if action == "convert_to_titlecase"
    )));
}

#[test]
fn dropna_shrinks_matrix_and_labels_together() {
    let table = read_csv_from(
        "customer,step,amount,merchant,category,fraud,note\n\
         C1,1,10,M1,food,0,ok\nC1,2,20,M2,food,1,\nC1,3,30,M1,food,0,ok\n"
            .as_bytes(),
    )
    .unwrap();
    let pipeline = pipeline().with_cleaning_rules(vec![CleaningRule::Dropna]);
    let out = pipeline
        .run(table, &plan(&["amount"], ScalingMode::None, ImbalanceStrategy::None))
        .unwrap();
    assert_eq!(out.matrix.column("amount").unwrap(), &[10.0, 30.0]);
    assert_eq!(out.labels, vec![0, 0]);
}

#[test]
fn header_only_ledger_yields_empty_outputs() {
    let table = read_csv_from("customer,step,amount,merchant,category,fraud\n".as_bytes()).unwrap();
    let out = pipeline()
        .run(
            table,
            &plan(&["amount", "rolling_txn_count"], ScalingMode::Standard, ImbalanceStrategy::ScalePosWeight),
        )
        .unwrap();
    assert_eq!(out.matrix.shape(), (0, 2));
    assert!(out.labels.is_empty());
    assert_eq!(out.sample_weights, Some(Vec::new()));
    assert!(out.scalers.is_empty());
}

#[test]
fn codes_from_cleaning_are_not_scaled() {
    let table = read_csv_from(
        "customer,step,amount,merchant,category,fraud\n\
         C1,1,10,M1,food,0\nC1,2,20,M1,travel,0\nC1,3,40,M1,zoo,1\n"
            .as_bytes(),
    )
    .unwrap();
    let rules = vec![CleaningRule::EncodeCategoricals { columns: vec!["category".into()] }];
    let out = pipeline()
        .with_cleaning_rules(rules)
        .run(table, &plan(&["category", "amount"], ScalingMode::Standard, ImbalanceStrategy::None))
        .unwrap();

    let category = &out.matrix.columns()[0];
    assert_eq!(category.kind, ColumnKind::Encoded);
    assert_eq!(category.values, vec![0.0, 1.0, 2.0]);
    assert_eq!(out.scalers.len(), 1);
    assert_eq!(out.scalers[0].column, "amount");
}

#[test]
fn rejected_cleaning_rules_are_reported_with_the_run() {
    let pipeline = pipeline().with_raw_cleaning_rules(&json!([
        {"action": "strip_whitespace", "columns": ["merchant"]},
        {"action": "teleport"},
    ]));
    for _ in 0..2 {
        let out = pipeline
            .run(ledger(), &plan(&["amount"], ScalingMode::None, ImbalanceStrategy::None))
            .unwrap();
        let rejected = out
            .warnings
            .iter()
            .filter(|w| matches!(w, EtlWarning::UnknownCleaningRule { .. }))
            .count();
        assert_eq!(rejected, 1, "warnings: {:?}", out.warnings);
    }
}

#[test]
fn invalid_window_config_is_rejected_up_front() {
    for window in [RecentWindow::Steps(f64::NAN), RecentWindow::Steps(-2.0), RecentWindow::Rows(0)] {
        let config = EtlConfig { window, ..EtlConfig::default_test() };
        assert!(EtlPipeline::new(config).is_err(), "{window:?} should be rejected");
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

trait WithoutColumn {
    fn into_without(self, name: &str) -> Table;
}

impl WithoutColumn for Table {
    fn into_without(self, name: &str) -> Table {
        let kept: Vec<_> = self
            .iter()
            .filter(|(n, _)| *n != name)
            .map(|(n, c)| (n.to_string(), c.clone()))
            .collect();
        Table::from_columns(kept).expect("subset of a valid table")
    }
}
