//! FeaturePlan: the externally supplied, untrusted run configuration.
//!
//! RULE: Never assume shape. Every field is optional with a stated
//! default; a field of the wrong type or with an unknown value is
//! defaulted and reported, never fatal.
//!
//!   features            -> []
//!   model               -> "none" (opaque, passed through)
//!   scaling             -> none
//!   imbalance_strategy  -> none

use crate::warning::{self, EtlWarning};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    Standard,
    Minmax,
    #[default]
    None,
}

impl ScalingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Minmax => "minmax",
            Self::None => "none",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "standard" => Some(Self::Standard),
            "minmax" | "min_max" => Some(Self::Minmax),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceStrategy {
    ScalePosWeight,
    Smote,
    Undersample,
    #[default]
    None,
}

impl ImbalanceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScalePosWeight => "scale_pos_weight",
            Self::Smote => "smote",
            Self::Undersample => "undersample",
            Self::None => "none",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "scale_pos_weight" => Some(Self::ScalePosWeight),
            "smote" => Some(Self::Smote),
            "undersample" => Some(Self::Undersample),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Model requested by the planner. Model selection happens downstream,
/// so an unrecognised name is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ModelKind {
    Xgboost,
    LogisticRegression,
    RandomForest,
    Lightgbm,
    #[default]
    Unspecified,
    Other(String),
}

impl ModelKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Xgboost => "xgboost",
            Self::LogisticRegression => "logistic_regression",
            Self::RandomForest => "random_forest",
            Self::Lightgbm => "lightgbm",
            Self::Unspecified => "none",
            Self::Other(name) => name,
        }
    }

    pub fn from_name(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "xgboost" => Self::Xgboost,
            "logistic_regression" => Self::LogisticRegression,
            "random_forest" => Self::RandomForest,
            "lightgbm" => Self::Lightgbm,
            "" | "none" => Self::Unspecified,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

impl From<ModelKind> for String {
    fn from(model: ModelKind) -> Self {
        model.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeaturePlan {
    pub features:           Vec<String>,
    pub model:              ModelKind,
    pub scaling:            ScalingMode,
    pub imbalance_strategy: ImbalanceStrategy,
}

impl FeaturePlan {
    /// Plan used when the planning collaborator cannot produce one.
    pub fn fallback() -> Self {
        Self {
            features:           vec!["amount".into(), "age".into(), "category".into()],
            model:              ModelKind::Xgboost,
            scaling:            ScalingMode::Standard,
            imbalance_strategy: ImbalanceStrategy::ScalePosWeight,
        }
    }

    /// Validate a raw JSON plan field by field.
    pub fn from_value(value: &Value, warnings: &mut Vec<EtlWarning>) -> Self {
        let mut plan = Self::default();
        let Some(fields) = value.as_object() else {
            field_warning(warnings, "<plan>", format!("expected an object, got {}", type_name(value)));
            return plan;
        };

        match fields.get("features") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item.as_str() {
                        Some(name) => plan.features.push(name.to_string()),
                        None => field_warning(
                            warnings,
                            "features",
                            format!("ignored non-string entry {item}"),
                        ),
                    }
                }
            }
            Some(other) => field_warning(
                warnings,
                "features",
                format!("expected a list, got {}", type_name(other)),
            ),
        }

        if let Some(raw) = string_field(fields.get("model"), "model", warnings) {
            plan.model = ModelKind::from_name(raw);
        }

        if let Some(raw) = string_field(fields.get("scaling"), "scaling", warnings) {
            match ScalingMode::parse(raw) {
                Some(mode) => plan.scaling = mode,
                None => field_warning(warnings, "scaling", format!("unknown mode '{raw}', using none")),
            }
        }

        if let Some(raw) = string_field(fields.get("imbalance_strategy"), "imbalance_strategy", warnings) {
            match ImbalanceStrategy::parse(raw) {
                Some(strategy) => plan.imbalance_strategy = strategy,
                None => field_warning(
                    warnings,
                    "imbalance_strategy",
                    format!("unknown strategy '{raw}', using none"),
                ),
            }
        }

        plan
    }

    /// Parse JSON text. Only malformed JSON is an error; shape problems
    /// are warnings as in `from_value`.
    pub fn from_json_str(json: &str, warnings: &mut Vec<EtlWarning>) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(&value, warnings))
    }
}

fn normalize_token(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['-', ' '], "_")
}

fn string_field<'v>(
    value: Option<&'v Value>,
    field: &str,
    warnings: &mut Vec<EtlWarning>,
) -> Option<&'v str> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            field_warning(warnings, field, format!("expected a string, got {}", type_name(other)));
            None
        }
    }
}

fn field_warning(warnings: &mut Vec<EtlWarning>, field: &str, detail: String) {
    warning::record(
        warnings,
        EtlWarning::PlanField {
            field: field.to_string(),
            detail,
        },
    );
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
