//! Temporal Feature Engine.
//!
//! For every transaction, derives five customer-relative features from
//! that customer's own history up to and including the transaction:
//!   1. rolling_txn_count        rows in the recent window
//!   2. rolling_amount_sum       amount over the recent window
//!   3. avg_amount_so_far        expanding mean of amount
//!   4. unique_merchants_so_far  distinct merchants seen so far
//!   5. is_risky_category        static category flag
//!
//! RULES:
//!   - One fixed order per customer: ascending step, ties by input
//!     position. Unset steps sort after every set step.
//!   - A CustomerRunningState belongs to exactly one customer and is
//!     dropped when that customer's pass ends. A row with no customer id
//!     gets a fresh state of its own.
//!   - Results land at the original row position. Output row order
//!     always equals input row order.
//!   - Unset amounts count as 0 in sums and means, and still count as
//!     a row. Derived columns never contain unset cells.

use crate::{
    config::{EtlConfig, RecentWindow},
    error::{EtlError, EtlResult},
    normalize::numeric_view,
    table::{Column, Table},
    types::{RowIndex, Step},
};
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};

// ── Column names ─────────────────────────────────────────────────────────────

pub const ROLLING_TXN_COUNT: &str = "rolling_txn_count";
pub const ROLLING_AMOUNT_SUM: &str = "rolling_amount_sum";
pub const AVG_AMOUNT_SO_FAR: &str = "avg_amount_so_far";
pub const UNIQUE_MERCHANTS_SO_FAR: &str = "unique_merchants_so_far";
pub const IS_RISKY_CATEGORY: &str = "is_risky_category";

/// Engineered columns, in the order they are appended.
pub const ENGINEERED_FEATURES: [&str; 5] = [
    ROLLING_TXN_COUNT,
    ROLLING_AMOUNT_SUM,
    AVG_AMOUNT_SO_FAR,
    UNIQUE_MERCHANTS_SO_FAR,
    IS_RISKY_CATEGORY,
];

// ── Data Structures ──────────────────────────────────────────────────────────

/// The five values derived for one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedFeatures {
    pub rolling_txn_count:       u32,
    pub rolling_amount_sum:      f64,
    pub avg_amount_so_far:       f64,
    pub unique_merchants_so_far: u32,
    pub is_risky_category:       u8,
}

/// Running accumulator for a single customer.
#[derive(Debug)]
pub struct CustomerRunningState<'a> {
    window:                RecentWindow,
    /// (step, amount) of the transactions inside the recent window.
    recent:                VecDeque<(Step, f64)>,
    cumulative_amount_sum: f64,
    cumulative_count:      usize,
    /// Step of the latest observation; keeps `recent` ascending.
    latest_step:           Option<Step>,
    seen_merchants:        HashSet<Option<Cow<'a, str>>>,
}

/// Snapshot of the running statistics after one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningSnapshot {
    pub recent_count:     u32,
    pub recent_sum:       f64,
    pub expanding_mean:   f64,
    pub unique_merchants: u32,
}

impl<'a> CustomerRunningState<'a> {
    pub fn new(window: RecentWindow) -> Self {
        Self {
            window,
            recent: VecDeque::new(),
            cumulative_amount_sum: 0.0,
            cumulative_count: 0,
            latest_step: None,
            seen_merchants: HashSet::new(),
        }
    }

    /// Fold the next transaction, in sorted order, into the state.
    pub fn observe(
        &mut self,
        step: Option<Step>,
        amount: Option<f64>,
        merchant: Option<Cow<'a, str>>,
    ) -> RunningSnapshot {
        let amount = amount.unwrap_or(0.0);
        // Unset steps sort last, so for window arithmetic they take the
        // latest step seen (0 when the customer has none).
        let step = step.or(self.latest_step).unwrap_or(0.0);
        self.latest_step = Some(step);

        self.recent.push_back((step, amount));
        match self.window {
            RecentWindow::Rows(len) => {
                while self.recent.len() > len.max(1) {
                    self.recent.pop_front();
                }
            }
            RecentWindow::Steps(span) => {
                while let Some(&(front, _)) = self.recent.front() {
                    if front <= step - span {
                        self.recent.pop_front();
                    } else {
                        break;
                    }
                }
            }
        }

        self.cumulative_amount_sum += amount;
        self.cumulative_count += 1;
        self.seen_merchants.insert(merchant);

        RunningSnapshot {
            recent_count:     self.recent.len() as u32,
            // Summed fresh each time so the value never carries drift
            // from earlier evictions.
            recent_sum:       self.recent.iter().map(|(_, a)| a).sum(),
            expanding_mean:   self.cumulative_amount_sum / self.cumulative_count as f64,
            unique_merchants: self.seen_merchants.len() as u32,
        }
    }

    pub fn cumulative_count(&self) -> usize {
        self.cumulative_count
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct TemporalFeatureEngine {
    config:           EtlConfig,
    risky_categories: HashSet<String>,
}

/// Borrowed input columns for one engineering pass.
struct EngineInputs<'t> {
    customers:  &'t Column,
    steps:      Cow<'t, [Option<f64>]>,
    amounts:    Cow<'t, [Option<f64>]>,
    merchants:  &'t Column,
    categories: &'t Column,
}

impl TemporalFeatureEngine {
    pub fn new(config: &EtlConfig) -> Self {
        Self {
            risky_categories: config.risky_categories.iter().cloned().collect(),
            config:           config.clone(),
        }
    }

    pub fn is_risky(&self, category: Option<&str>) -> bool {
        category.is_some_and(|c| self.risky_categories.contains(c))
    }

    /// Compute the derived features for every row, in input order.
    pub fn derive(&self, table: &Table) -> EtlResult<Vec<DerivedFeatures>> {
        let names = &self.config.columns;
        table.require("feature_engineering", &names.engine_inputs())?;
        let column = |name: &str| {
            table.column(name).ok_or_else(|| EtlError::Schema {
                stage:   "feature_engineering",
                missing: vec![name.to_string()],
            })
        };

        let inputs = EngineInputs {
            customers:  column(names.customer.as_str())?,
            steps:      numeric_view(column(names.step.as_str())?),
            amounts:    numeric_view(column(names.amount.as_str())?),
            merchants:  column(names.merchant.as_str())?,
            categories: column(names.category.as_str())?,
        };

        let groups = partition_by_customer(inputs.customers);
        log::debug!(
            "Engineering {} rows across {} customers (parallel: {})",
            table.n_rows(),
            groups.len(),
            self.config.parallel
        );

        let per_group: Vec<Vec<(RowIndex, DerivedFeatures)>> = if self.config.parallel {
            groups
                .into_par_iter()
                .map(|rows| self.process_customer(rows, &inputs))
                .collect()
        } else {
            groups
                .into_iter()
                .map(|rows| self.process_customer(rows, &inputs))
                .collect()
        };

        // Scatter: each customer owns a disjoint set of row positions.
        let mut out = vec![DerivedFeatures::default(); table.n_rows()];
        for (row, features) in per_group.into_iter().flatten() {
            out[row] = features;
        }
        Ok(out)
    }

    /// Append (or replace) the five engineered columns.
    pub fn engineer(&self, mut table: Table) -> EtlResult<Table> {
        let derived = self.derive(&table)?;

        let numeric = |f: fn(&DerivedFeatures) -> f64| {
            Column::Numeric(derived.iter().map(|d| Some(f(d))).collect())
        };
        table.set_column(ROLLING_TXN_COUNT, numeric(|d| d.rolling_txn_count as f64))?;
        table.set_column(ROLLING_AMOUNT_SUM, numeric(|d| d.rolling_amount_sum))?;
        table.set_column(AVG_AMOUNT_SO_FAR, numeric(|d| d.avg_amount_so_far))?;
        table.set_column(UNIQUE_MERCHANTS_SO_FAR, numeric(|d| d.unique_merchants_so_far as f64))?;
        table.set_column(IS_RISKY_CATEGORY, numeric(|d| d.is_risky_category as f64))?;

        log::info!("Feature engineering complete: {} rows", table.n_rows());
        Ok(table)
    }

    /// One customer's full pass. Owns its rows and its running state.
    fn process_customer<'t>(
        &self,
        mut rows: Vec<RowIndex>,
        inputs: &EngineInputs<'t>,
    ) -> Vec<(RowIndex, DerivedFeatures)> {
        sort_chronologically(&mut rows, &inputs.steps);

        let mut state = CustomerRunningState::new(self.config.window);
        rows.into_iter()
            .map(|row| {
                let snap = state.observe(
                    inputs.steps[row],
                    inputs.amounts[row],
                    inputs.merchants.cell_text(row),
                );
                let category = inputs.categories.cell_text(row);
                let features = DerivedFeatures {
                    rolling_txn_count:       snap.recent_count,
                    rolling_amount_sum:      snap.recent_sum,
                    avg_amount_so_far:       snap.expanding_mean,
                    unique_merchants_so_far: snap.unique_merchants,
                    is_risky_category:       self.is_risky(category.as_deref()) as u8,
                };
                (row, features)
            })
            .collect()
    }
}

/// Group row positions by customer. Groups appear in first-seen order
/// and each group lists its rows in input order. A row with no customer
/// id belongs to nobody's history and forms a group of its own.
fn partition_by_customer(customers: &Column) -> Vec<Vec<RowIndex>> {
    let mut index: HashMap<Cow<'_, str>, usize> = HashMap::new();
    let mut groups: Vec<Vec<RowIndex>> = Vec::new();
    for row in 0..customers.len() {
        let Some(key) = customers.cell_text(row) else {
            groups.push(vec![row]);
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    groups
}

/// Stable sort by step; unset steps last. Stability keeps input order
/// for ties.
fn sort_chronologically(rows: &mut [RowIndex], steps: &[Option<f64>]) {
    rows.sort_by(|&a, &b| match (steps[a], steps[b]) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
