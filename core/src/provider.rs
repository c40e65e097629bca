//! Plan providers.
//!
//! RULE: The pipeline never reaches for a global client. Whatever
//! produces the plan is injected as a PlanProvider and hands back raw
//! JSON; validation happens at the selector boundary (plan.rs).

use crate::{plan::FeaturePlan, table::SchemaSummary};
use serde_json::Value;
use std::path::PathBuf;

pub trait PlanProvider {
    /// Short stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Produce a raw plan for a dataset with the given schema.
    fn provide(&self, schema: &SchemaSummary) -> anyhow::Result<Value>;
}

/// Always returns the same plan.
pub struct StaticPlanProvider {
    plan: Value,
}

impl StaticPlanProvider {
    pub fn new(plan: Value) -> Self {
        Self { plan }
    }

    pub fn from_plan(plan: &FeaturePlan) -> anyhow::Result<Self> {
        Ok(Self::new(serde_json::to_value(plan)?))
    }
}

impl PlanProvider for StaticPlanProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn provide(&self, _schema: &SchemaSummary) -> anyhow::Result<Value> {
        Ok(self.plan.clone())
    }
}

/// Reads the plan from a JSON file on every call.
pub struct JsonFilePlanProvider {
    path: PathBuf,
}

impl JsonFilePlanProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlanProvider for JsonFilePlanProvider {
    fn name(&self) -> &'static str {
        "json_file"
    }

    fn provide(&self, _schema: &SchemaSummary) -> anyhow::Result<Value> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", self.path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Wraps another provider and substitutes a fixed plan when it fails.
pub struct FallbackPlanProvider<P> {
    inner:    P,
    fallback: Value,
}

impl<P: PlanProvider> FallbackPlanProvider<P> {
    /// Falls back to `FeaturePlan::fallback()`.
    pub fn new(inner: P) -> anyhow::Result<Self> {
        Ok(Self::with_fallback(inner, serde_json::to_value(FeaturePlan::fallback())?))
    }

    pub fn with_fallback(inner: P, fallback: Value) -> Self {
        Self { inner, fallback }
    }
}

impl<P: PlanProvider> PlanProvider for FallbackPlanProvider<P> {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn provide(&self, schema: &SchemaSummary) -> anyhow::Result<Value> {
        match self.inner.provide(schema) {
            Ok(plan) => Ok(plan),
            Err(e) => {
                log::warn!("Plan provider '{}' failed: {e:#}. Using fallback plan.", self.inner.name());
                Ok(self.fallback.clone())
            }
        }
    }
}
