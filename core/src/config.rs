use serde::{Deserialize, Serialize};

/// Categories flagged by `is_risky_category`.
pub const DEFAULT_RISKY_CATEGORIES: [&str; 4] =
    ["travel", "misc_net", "shopping_net", "entertainment"];

/// Length of the default position-based recent window.
pub const DEFAULT_WINDOW_ROWS: usize = 5;

/// Raw column names the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub customer: String,
    pub step:     String,
    pub amount:   String,
    pub merchant: String,
    pub category: String,
    pub label:    String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            customer: "customer".into(),
            step:     "step".into(),
            amount:   "amount".into(),
            merchant: "merchant".into(),
            category: "category".into(),
            label:    "fraud".into(),
        }
    }
}

impl ColumnNames {
    /// Columns the temporal feature engine cannot run without.
    pub fn engine_inputs(&self) -> [&str; 5] {
        [
            self.customer.as_str(),
            self.step.as_str(),
            self.amount.as_str(),
            self.merchant.as_str(),
            self.category.as_str(),
        ]
    }

    /// Every column a full ETL run requires.
    pub fn required(&self) -> [&str; 6] {
        [
            self.customer.as_str(),
            self.step.as_str(),
            self.amount.as_str(),
            self.merchant.as_str(),
            self.category.as_str(),
            self.label.as_str(),
        ]
    }
}

/// Shape of the "recent activity" window.
///
/// `Rows(n)` is the last n transactions by sorted position, whatever
/// their step. `Steps(span)` keeps the transactions whose step lies in
/// `(current - span, current]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentWindow {
    Rows(usize),
    Steps(f64),
}

impl Default for RecentWindow {
    fn default() -> Self {
        Self::Rows(DEFAULT_WINDOW_ROWS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub columns:          ColumnNames,
    pub window:           RecentWindow,
    pub risky_categories: Vec<String>,
    /// Engineer customer groups on the rayon pool.
    pub parallel:         bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            columns:          ColumnNames::default(),
            window:           RecentWindow::default(),
            risky_categories: DEFAULT_RISKY_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            parallel:         true,
        }
    }
}

impl EtlConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    /// In tests, use EtlConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EtlConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Runs the engine sequentially.
    pub fn default_test() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.window {
            RecentWindow::Rows(0) => anyhow::bail!("window.rows must be at least 1"),
            RecentWindow::Steps(span) if !(span.is_finite() && span > 0.0) => {
                anyhow::bail!("window.steps must be a positive number, got {span}")
            }
            _ => {}
        }
        let names = self.columns.required();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                anyhow::bail!("column names must not be empty");
            }
            if names[..i].contains(name) {
                anyhow::bail!("column '{name}' is mapped to more than one role");
            }
        }
        Ok(())
    }
}
