//! Time-bucketed series for charting churn and LTV results.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use retention_core::config::{TrendConfig, TrendStrategy};
use retention_core::types::{safe_div, AnalysisWindow};
use serde::Serialize;

use crate::churn::{ChurnBand, ChurnCustomer};
use crate::ltv::LtvPrediction;

/// Bucket width for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Monthly,
    Quarterly,
}

impl Granularity {
    /// Sequential bucket index; consecutive buckets differ by one.
    pub fn index(&self, date: NaiveDate) -> i64 {
        match self {
            Granularity::Daily => date.num_days_from_ce() as i64,
            Granularity::Monthly => date.year() as i64 * 12 + date.month0() as i64,
            Granularity::Quarterly => date.year() as i64 * 4 + (date.month0() / 3) as i64,
        }
    }

    pub fn label(&self, index: i64) -> String {
        match self {
            Granularity::Daily => i32::try_from(index)
                .ok()
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            Granularity::Monthly => {
                format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
            }
            Granularity::Quarterly => {
                format!("{:04}-Q{}", index.div_euclid(4), index.rem_euclid(4) + 1)
            }
        }
    }
}

/// One day of the churn trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnTrendPoint {
    pub date: String,
    pub high_risk: u32,
    pub medium_risk: u32,
    pub low_risk: u32,
    pub revenue_at_risk: f64,
}

/// Churn outcome for customers acquired in one month or quarter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortChurnPoint {
    pub period: String,
    pub granularity: Granularity,
    pub customers: u32,
    pub high_risk: u32,
    pub churn_rate: f64,
    pub avg_risk_score: f64,
}

/// Predicted LTV of customers acquired in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtvTrendPoint {
    pub period: String,
    pub customers: u32,
    pub total_predicted_ltv: f64,
    pub avg_predicted_ltv: f64,
}

#[derive(Debug, Clone)]
pub struct TrendBucketer {
    strategy: TrendStrategy,
    quarterly_threshold_days: i64,
}

impl TrendBucketer {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            strategy: config.strategy,
            quarterly_threshold_days: config.quarterly_threshold_days,
        }
    }

    /// Daily churn series across the window, one point per calendar day.
    pub fn churn_trend(&self, window: &AnalysisWindow, rows: &[ChurnCustomer]) -> Vec<ChurnTrendPoint> {
        let granularity = Granularity::Daily;
        let first = granularity.index(window.start.date_naive());
        let last = granularity.index(window.end.date_naive());
        let buckets = (last - first + 1) as usize;

        let mut points: Vec<ChurnTrendPoint> = (first..=last)
            .map(|i| ChurnTrendPoint {
                date: granularity.label(i),
                high_risk: 0,
                medium_risk: 0,
                low_risk: 0,
                revenue_at_risk: 0.0,
            })
            .collect();

        match self.strategy {
            TrendStrategy::EvenSplit => {
                let count = |band: ChurnBand| rows.iter().filter(|r| r.prediction.band == band).count() as u32;
                let n = buckets as u32;
                let high = count(ChurnBand::High) / n;
                let medium = count(ChurnBand::Medium) / n;
                let low = count(ChurnBand::Low) / n;
                let revenue = safe_div(
                    rows.iter().map(|r| r.prediction.revenue_at_risk).sum(),
                    buckets as f64,
                );
                for point in &mut points {
                    point.high_risk = high;
                    point.medium_risk = medium;
                    point.low_risk = low;
                    point.revenue_at_risk = revenue;
                }
            }
            TrendStrategy::PerBucket => {
                for row in rows {
                    let slot = bucket_of(granularity, row.last_order_date, first, last);
                    let point = &mut points[slot];
                    match row.prediction.band {
                        ChurnBand::High => point.high_risk += 1,
                        ChurnBand::Medium => point.medium_risk += 1,
                        ChurnBand::Low => point.low_risk += 1,
                    }
                    point.revenue_at_risk += row.prediction.revenue_at_risk;
                }
            }
        }

        points
    }

    /// Churn grouped by acquisition period: monthly, or quarterly once the
    /// window is longer than the configured threshold. Customers with no
    /// order in the window have no acquisition period and are left out.
    pub fn cohort_churn_trend(
        &self,
        window: &AnalysisWindow,
        rows: &[ChurnCustomer],
    ) -> Vec<CohortChurnPoint> {
        let granularity = if window.days() > self.quarterly_threshold_days {
            Granularity::Quarterly
        } else {
            Granularity::Monthly
        };
        let first = granularity.index(window.start.date_naive());
        let last = granularity.index(window.end.date_naive());

        let mut counts = vec![(0u32, 0u32, 0.0f64); (last - first + 1) as usize];
        for row in rows {
            if row.first_order_date.is_none() {
                continue;
            }
            let slot = bucket_of(granularity, row.first_order_date, first, last);
            let entry = &mut counts[slot];
            entry.0 += 1;
            if row.prediction.band == ChurnBand::High {
                entry.1 += 1;
            }
            entry.2 += row.prediction.risk_score;
        }

        (first..=last)
            .zip(counts)
            .map(|(i, (customers, high_risk, risk_total))| CohortChurnPoint {
                period: granularity.label(i),
                granularity,
                customers,
                high_risk,
                churn_rate: safe_div(high_risk as f64 * 100.0, customers as f64),
                avg_risk_score: safe_div(risk_total, customers as f64),
            })
            .collect()
    }

    /// Monthly LTV series keyed by each customer's first order, spanning the
    /// earliest to the latest acquisition month without gaps.
    pub fn ltv_trend(&self, predictions: &[LtvPrediction]) -> Vec<LtvTrendPoint> {
        let granularity = Granularity::Monthly;
        let indexed: Vec<(i64, f64)> = predictions
            .iter()
            .filter_map(|p| {
                p.first_order_date
                    .map(|d| (granularity.index(d.date_naive()), p.predicted_ltv))
            })
            .collect();

        let (Some(first), Some(last)) = (
            indexed.iter().map(|(i, _)| *i).min(),
            indexed.iter().map(|(i, _)| *i).max(),
        ) else {
            return Vec::new();
        };

        (first..=last)
            .map(|i| {
                let members: Vec<f64> = indexed
                    .iter()
                    .filter(|(idx, _)| *idx == i)
                    .map(|(_, ltv)| *ltv)
                    .collect();
                let total: f64 = members.iter().sum();
                LtvTrendPoint {
                    period: granularity.label(i),
                    customers: members.len() as u32,
                    total_predicted_ltv: total,
                    avg_predicted_ltv: safe_div(total, members.len() as f64),
                }
            })
            .collect()
    }
}

/// Slot for `date`, clamped into `[first, last]`; missing dates use the first slot.
fn bucket_of(granularity: Granularity, date: Option<DateTime<Utc>>, first: i64, last: i64) -> usize {
    let index = date
        .map(|d| granularity.index(d.date_naive()).clamp(first, last))
        .unwrap_or(first);
    (index - first) as usize
}
