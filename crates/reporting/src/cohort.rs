//! Cohort analysis: retention curves and cumulative revenue by acquisition
//! period.
//!
//! A customer's cohort is the period of their first order in the supplied
//! history. Output is sorted by cohort, then period index; charts and tables
//! rely on that order.

use chrono::{DateTime, Datelike, Utc};
use retention_core::types::{safe_div, Order};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortPeriod {
    Monthly,
    Yearly,
}

impl CohortPeriod {
    fn index(&self, ts: &DateTime<Utc>) -> i64 {
        match self {
            CohortPeriod::Monthly => ts.year() as i64 * 12 + ts.month0() as i64,
            CohortPeriod::Yearly => ts.year() as i64,
        }
    }

    fn label(&self, index: i64) -> String {
        match self {
            CohortPeriod::Monthly => {
                format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
            }
            CohortPeriod::Yearly => format!("{index:04}"),
        }
    }
}

/// Retention and revenue for one cohort at one period offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPoint {
    /// `YYYY-MM` for monthly cohorts, `YYYY` for yearly ones.
    pub cohort: String,
    pub period_index: u32,
    pub cohort_size: u64,
    pub customers_remaining: u64,
    /// 0–100; exactly 100 at period 0.
    pub retention_rate: f64,
    pub period_revenue: f64,
    /// Revenue from period 0 through this period.
    pub cumulative_revenue: f64,
    pub avg_revenue_per_customer: f64,
}

/// Matrix view of one cohort for table rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortRow {
    pub cohort: String,
    pub initial_size: u64,
    pub retention_rates: Vec<f64>,
}

#[derive(Default)]
struct PeriodBucket<'a> {
    customers: BTreeSet<&'a str>,
    revenue: f64,
}

pub struct CohortAnalyzer {
    period: CohortPeriod,
}

impl CohortAnalyzer {
    pub fn new(period: CohortPeriod) -> Self {
        Self { period }
    }

    /// Build the cohort series. Orders without a customer are ignored.
    pub fn analyze(&self, orders: &[Order]) -> Vec<CohortPoint> {
        let attributed: Vec<(&str, &Order)> = orders
            .iter()
            .filter_map(|o| o.customer_id.as_deref().map(|c| (c, o)))
            .collect();

        let mut first_order: HashMap<&str, &DateTime<Utc>> = HashMap::new();
        for &(customer_id, order) in &attributed {
            first_order
                .entry(customer_id)
                .and_modify(|ts| {
                    if order.created_at < **ts {
                        *ts = &order.created_at;
                    }
                })
                .or_insert(&order.created_at);
        }

        let mut cohorts: BTreeMap<i64, BTreeMap<u32, PeriodBucket>> = BTreeMap::new();
        for &(customer_id, order) in &attributed {
            let cohort = self.period.index(first_order[customer_id]);
            let period_index = (self.period.index(&order.created_at) - cohort) as u32;
            let bucket = cohorts
                .entry(cohort)
                .or_default()
                .entry(period_index)
                .or_default();
            bucket.customers.insert(customer_id);
            bucket.revenue += order.total_price;
        }

        let mut points = Vec::new();
        for (cohort, periods) in &cohorts {
            let label = self.period.label(*cohort);
            let cohort_size = periods.get(&0).map(|b| b.customers.len() as u64).unwrap_or(0);
            let max_period = periods.keys().next_back().copied().unwrap_or(0);

            let mut cumulative_revenue = 0.0;
            for period_index in 0..=max_period {
                let (customers_remaining, period_revenue) = periods
                    .get(&period_index)
                    .map(|b| (b.customers.len() as u64, b.revenue))
                    .unwrap_or((0, 0.0));
                cumulative_revenue += period_revenue;

                points.push(CohortPoint {
                    cohort: label.clone(),
                    period_index,
                    cohort_size,
                    customers_remaining,
                    retention_rate: safe_div(customers_remaining as f64 * 100.0, cohort_size as f64)
                        .clamp(0.0, 100.0),
                    period_revenue,
                    cumulative_revenue,
                    avg_revenue_per_customer: safe_div(cumulative_revenue, cohort_size as f64),
                });
            }
        }

        metrics::counter!("retention.cohort.cohorts_built").increment(cohorts.len() as u64);
        debug!(
            period = ?self.period,
            cohorts = cohorts.len(),
            customers = first_order.len(),
            points = points.len(),
            "Cohort analysis computed"
        );

        points
    }
}

impl Default for CohortAnalyzer {
    fn default() -> Self {
        Self::new(CohortPeriod::Monthly)
    }
}

/// Cohorts by calendar month when `group_by_year_month` is set, otherwise by
/// calendar year.
pub fn compute_cohort_analysis(orders: &[Order], group_by_year_month: bool) -> Vec<CohortPoint> {
    let period = if group_by_year_month {
        CohortPeriod::Monthly
    } else {
        CohortPeriod::Yearly
    };
    CohortAnalyzer::new(period).analyze(orders)
}

/// Collapse sorted points into one row per cohort.
pub fn retention_matrix(points: &[CohortPoint]) -> Vec<CohortRow> {
    let mut rows: Vec<CohortRow> = Vec::new();
    for point in points {
        match rows.last_mut() {
            Some(row) if row.cohort == point.cohort => row.retention_rates.push(point.retention_rate),
            _ => rows.push(CohortRow {
                cohort: point.cohort.clone(),
                initial_size: point.cohort_size,
                retention_rates: vec![point.retention_rate],
            }),
        }
    }
    rows
}
