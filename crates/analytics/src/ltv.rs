//! Lifetime value prediction: extrapolates each customer's observed run-rate
//! one year forward.

use chrono::{DateTime, Utc};
use retention_core::types::{safe_div, AnalysisWindow, Customer, Order};
use retention_core::RetentionResult;
use serde::Serialize;
use tracing::debug;

use crate::aggregator::{CustomerAggregate, WindowedAggregator};
use crate::trend::{LtvTrendPoint, TrendBucketer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LtvSegment {
    HighValue,
    MediumValue,
    LowValue,
}

impl LtvSegment {
    pub const ALL: [LtvSegment; 3] = [LtvSegment::HighValue, LtvSegment::MediumValue, LtvSegment::LowValue];

    pub fn from_ltv(predicted_ltv: f64) -> Self {
        if predicted_ltv > 1000.0 {
            LtvSegment::HighValue
        } else if predicted_ltv > 500.0 {
            LtvSegment::MediumValue
        } else {
            LtvSegment::LowValue
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LtvSegment::HighValue => "High Value",
            LtvSegment::MediumValue => "Medium Value",
            LtvSegment::LowValue => "Low Value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtvPrediction {
    pub customer_id: String,
    pub predicted_ltv: f64,
    /// 0–1.
    pub confidence: f64,
    pub segment: LtvSegment,
    pub total_spent: f64,
    pub order_count: u32,
    pub first_order_date: Option<DateTime<Utc>>,
}

/// Stateless run-rate extrapolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LtvPredictor;

impl LtvPredictor {
    pub const FORECAST_MONTHS: f64 = 12.0;

    pub fn predict(&self, aggregate: &CustomerAggregate) -> LtvPrediction {
        let predicted_ltv = if aggregate.order_count == 0 {
            0.0
        } else {
            let months_observed = (aggregate.days_since_first_order as f64 / 30.0).max(1.0);
            let orders_per_month = aggregate.order_count as f64 / months_observed;
            aggregate.total_spent
                + orders_per_month * Self::FORECAST_MONTHS * aggregate.avg_order_value
        };

        let confidence = match aggregate.order_count {
            n if n >= 5 => 0.9,
            n if n >= 3 => 0.7,
            n if n >= 1 => 0.6,
            _ => 0.5,
        };

        LtvPrediction {
            customer_id: aggregate.customer_id.clone(),
            predicted_ltv,
            confidence,
            segment: LtvSegment::from_ltv(predicted_ltv),
            total_spent: aggregate.total_spent,
            order_count: aggregate.order_count,
            first_order_date: aggregate.first_order_date,
        }
    }
}

/// Predict LTV for every customer from their full supplied history up to
/// `as_of`. Predictions follow customer input order.
pub fn compute_ltv_predictions(
    customers: &[Customer],
    orders: &[Order],
    as_of: DateTime<Utc>,
) -> RetentionResult<Vec<LtvPrediction>> {
    let earliest = orders
        .iter()
        .filter(|o| o.customer_id.is_some() && o.created_at <= as_of)
        .map(|o| o.created_at)
        .min()
        .unwrap_or(as_of);
    let window = AnalysisWindow::new(earliest, as_of)?;

    let predictor = LtvPredictor;
    let predictions: Vec<LtvPrediction> = WindowedAggregator::new(window)
        .aggregate(customers, orders)
        .iter()
        .map(|a| predictor.predict(a))
        .collect();

    metrics::counter!("retention.ltv.customers_predicted").increment(predictions.len() as u64);
    debug!(customers = predictions.len(), "LTV predictions computed");

    Ok(predictions)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtvSegmentCount {
    pub segment: LtvSegment,
    pub count: u32,
    pub total_predicted_ltv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtvSummary {
    pub total_customers: u32,
    pub total_predicted_ltv: f64,
    pub avg_predicted_ltv: f64,
    pub avg_confidence: f64,
    pub segments: Vec<LtvSegmentCount>,
    pub by_acquisition_month: Vec<LtvTrendPoint>,
}

pub fn summarize_ltv(predictions: &[LtvPrediction], bucketer: &TrendBucketer) -> LtvSummary {
    let total = predictions.len() as f64;
    let total_predicted_ltv: f64 = predictions.iter().map(|p| p.predicted_ltv).sum();

    let segments = LtvSegment::ALL
        .iter()
        .map(|&segment| {
            let members = predictions.iter().filter(|p| p.segment == segment);
            LtvSegmentCount {
                segment,
                count: members.clone().count() as u32,
                total_predicted_ltv: members.map(|p| p.predicted_ltv).sum(),
            }
        })
        .collect();

    LtvSummary {
        total_customers: predictions.len() as u32,
        total_predicted_ltv,
        avg_predicted_ltv: safe_div(total_predicted_ltv, total),
        avg_confidence: safe_div(predictions.iter().map(|p| p.confidence).sum(), total),
        segments,
        by_acquisition_month: bucketer.ltv_trend(predictions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use retention_core::config::TrendConfig;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
    }

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.to_string(),
            first_name: None,
            last_name: None,
            email: None,
            created_at: as_of() - Duration::days(400),
        }
    }

    fn order(id: &str, customer: &str, days_ago: i64, total: f64) -> Order {
        Order {
            id: id.to_string(),
            customer_id: Some(customer.to_string()),
            created_at: as_of() - Duration::days(days_ago),
            total_price: total,
            line_items: vec![],
        }
    }

    #[test]
    fn test_run_rate_extrapolation() {
        let orders = vec![
            order("o1", "c1", 90, 200.0),
            order("o2", "c1", 60, 200.0),
            order("o3", "c1", 30, 200.0),
        ];
        let predictions = compute_ltv_predictions(&[customer("c1")], &orders, as_of()).unwrap();
        let p = &predictions[0];
        // 3 orders over 3 months -> 1/month; 600 + 1 * 12 * 200
        assert!((p.predicted_ltv - 3000.0).abs() < 1e-9);
        assert_eq!(p.segment, LtvSegment::HighValue);
        assert_eq!(p.confidence, 0.7);
    }

    #[test]
    fn test_orders_after_as_of_are_ignored() {
        let orders = vec![
            order("o1", "c1", 90, 200.0),
            order("o2", "c1", 30, 200.0),
            order("later", "c1", -10, 5000.0),
        ];
        let predictions = compute_ltv_predictions(&[customer("c1")], &orders, as_of()).unwrap();
        let p = &predictions[0];
        assert_eq!(p.order_count, 2);
        assert_eq!(p.total_spent, 400.0);
        assert_eq!(p.first_order_date, Some(as_of() - Duration::days(90)));
        // 2 orders over 3 months; 400 + 2/3 * 12 * 200
        assert!((p.predicted_ltv - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_orders_predicts_zero() {
        let predictions = compute_ltv_predictions(&[customer("c1")], &[], as_of()).unwrap();
        assert_eq!(predictions[0].predicted_ltv, 0.0);
        assert_eq!(predictions[0].confidence, 0.5);
        assert_eq!(predictions[0].segment, LtvSegment::LowValue);
    }

    #[test]
    fn test_recent_first_order_uses_one_month_floor() {
        let orders = vec![order("o1", "c1", 3, 50.0)];
        let predictions = compute_ltv_predictions(&[customer("c1")], &orders, as_of()).unwrap();
        // 50 + 1 * 12 * 50
        assert!((predictions[0].predicted_ltv - 650.0).abs() < 1e-9);
        assert_eq!(predictions[0].segment, LtvSegment::MediumValue);
        assert_eq!(predictions[0].confidence, 0.6);
    }

    #[test]
    fn test_segment_thresholds_are_exclusive() {
        assert_eq!(LtvSegment::from_ltv(1000.0), LtvSegment::MediumValue);
        assert_eq!(LtvSegment::from_ltv(1000.01), LtvSegment::HighValue);
        assert_eq!(LtvSegment::from_ltv(500.0), LtvSegment::LowValue);
    }

    #[test]
    fn test_summary_counts_segments() {
        let orders = vec![
            order("o1", "c1", 90, 200.0),
            order("o2", "c1", 60, 200.0),
            order("o3", "c1", 30, 200.0),
            order("o4", "c2", 10, 20.0),
        ];
        let customers = vec![customer("c1"), customer("c2"), customer("c3")];
        let predictions = compute_ltv_predictions(&customers, &orders, as_of()).unwrap();
        let summary = summarize_ltv(&predictions, &TrendBucketer::new(&TrendConfig::default()));

        assert_eq!(summary.total_customers, 3);
        assert_eq!(summary.segments[0].count, 1);
        assert_eq!(summary.segments[2].count, 2);
        assert!((summary.total_predicted_ltv - (3000.0 + 260.0)).abs() < 1e-9);
        // acquisition months 2024-04 .. 2024-06, no gaps
        assert_eq!(summary.by_acquisition_month.len(), 3);
        assert_eq!(summary.by_acquisition_month[0].period, "2024-04");
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let summary = summarize_ltv(&[], &TrendBucketer::new(&TrendConfig::default()));
        assert_eq!(summary.avg_predicted_ltv, 0.0);
        assert!(summary.by_acquisition_month.is_empty());
    }
}
