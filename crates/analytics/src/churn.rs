//! Churn classification and the merchant-level churn analytics report.
//!
//! Flow: orders → `WindowedAggregator` → `RiskFactorModel` → `ChurnClassifier`,
//! then `TrendBucketer` folds the predictions into chart series.

use chrono::{DateTime, Utc};
use retention_core::config::EngineConfig;
use retention_core::types::{safe_div, AnalysisWindow, Customer, MerchantContext, Order};
use retention_core::RetentionResult;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::aggregator::{CustomerAggregate, WindowedAggregator};
use crate::risk::{risk_score, RiskFactor, RiskFactorModel};
use crate::trend::{ChurnTrendPoint, CohortChurnPoint, TrendBucketer};

// ─── Bands & Predictions ────────────────────────────────────────────────────

/// Coarse risk category. Ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnBand {
    High,
    Medium,
    Low,
}

impl ChurnBand {
    pub const ALL: [ChurnBand; 3] = [ChurnBand::High, ChurnBand::Medium, ChurnBand::Low];

    pub const HIGH_THRESHOLD: f64 = 70.0;
    pub const MEDIUM_THRESHOLD: f64 = 40.0;

    pub fn from_score(risk_score: f64) -> Self {
        if risk_score >= Self::HIGH_THRESHOLD {
            ChurnBand::High
        } else if risk_score >= Self::MEDIUM_THRESHOLD {
            ChurnBand::Medium
        } else {
            ChurnBand::Low
        }
    }
}

/// Churn prediction for one customer in one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnPrediction {
    pub customer_id: String,
    pub risk_score: f64,
    pub band: ChurnBand,
    pub revenue_at_risk: f64,
    /// 0–100.
    pub confidence: f64,
    pub factors: Vec<RiskFactor>,
}

/// Turns scored factors into a banded prediction.
#[derive(Debug, Clone)]
pub struct ChurnClassifier {
    churn_period_days: u32,
    data_completeness: f64,
}

impl ChurnClassifier {
    pub fn new(churn_period_days: u32, window: &AnalysisWindow) -> Self {
        Self {
            churn_period_days,
            data_completeness: (window.days() as f64 / 30.0).clamp(0.0, 1.0),
        }
    }

    pub fn classify(&self, aggregate: &CustomerAggregate, factors: Vec<RiskFactor>) -> ChurnPrediction {
        let risk_score = risk_score(&factors);
        ChurnPrediction {
            customer_id: aggregate.customer_id.clone(),
            risk_score,
            band: ChurnBand::from_score(risk_score),
            revenue_at_risk: aggregate.total_spent * risk_score / 100.0,
            confidence: self.confidence(aggregate),
            factors,
        }
    }

    fn confidence(&self, aggregate: &CustomerAggregate) -> f64 {
        let has_recent_orders = aggregate.has_orders()
            && aggregate.days_since_last_order <= self.churn_period_days as i64;
        let history = match aggregate.order_count {
            n if n >= 5 => 30.0,
            n if n >= 2 => 20.0,
            1 => 10.0,
            _ => 0.0,
        };
        let recent = if has_recent_orders { 30.0 } else { 0.0 };
        (40.0 * self.data_completeness + recent + history).clamp(0.0, 100.0)
    }
}

// ─── Report Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnSummary {
    pub total_customers: u32,
    pub high_risk: u32,
    pub medium_risk: u32,
    pub low_risk: u32,
    /// High-risk customers as a percentage of all customers.
    pub churn_rate: f64,
    pub avg_risk_score: f64,
    pub total_revenue_at_risk: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSegmentSummary {
    pub band: ChurnBand,
    pub count: u32,
    pub percentage: f64,
    pub revenue_at_risk: f64,
    pub avg_risk_score: f64,
}

/// A customer row in the churn report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnCustomer {
    pub customer_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub total_spent: f64,
    pub order_count: u32,
    pub days_since_last_order: i64,
    pub first_order_date: Option<DateTime<Utc>>,
    pub last_order_date: Option<DateTime<Utc>>,
    pub prediction: ChurnPrediction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnAnalytics {
    pub merchant_id: String,
    pub currency: String,
    pub window: AnalysisWindow,
    pub summary: ChurnSummary,
    pub churn_trend: Vec<ChurnTrendPoint>,
    pub cohort_trend: Vec<CohortChurnPoint>,
    /// Always High, Medium, Low in that order.
    pub risk_segments: Vec<RiskSegmentSummary>,
    /// Highest risk first.
    pub customers: Vec<ChurnCustomer>,
}

// ─── Analyzer ───────────────────────────────────────────────────────────────

/// Computes churn analytics for one merchant and window. Holds no state
/// between calls.
pub struct ChurnAnalyzer {
    bucketer: TrendBucketer,
}

impl ChurnAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        info!(
            trend_strategy = ?config.trend.strategy,
            quarterly_threshold_days = config.trend.quarterly_threshold_days,
            "Churn analyzer initialized"
        );
        Self {
            bucketer: TrendBucketer::new(&config.trend),
        }
    }

    /// Score every customer and assemble the report.
    ///
    /// Empty inputs yield a zeroed report, never an error.
    pub fn compute_churn_analytics(
        &self,
        context: &MerchantContext,
        customers: &[Customer],
        orders: &[Order],
        window: &AnalysisWindow,
    ) -> RetentionResult<ChurnAnalytics> {
        let window = AnalysisWindow::new(window.start, window.end)?;
        context.settings.validate()?;

        let aggregator = WindowedAggregator::new(window);
        let model = RiskFactorModel::new(&context.settings);
        let classifier = ChurnClassifier::new(context.settings.churn_period_days, &window);

        let by_id: HashMap<&str, &Customer> = customers.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut rows: Vec<ChurnCustomer> = aggregator
            .aggregate(customers, orders)
            .into_iter()
            .map(|aggregate| {
                let prediction = classifier.classify(&aggregate, model.score(&aggregate));
                let customer = by_id.get(aggregate.customer_id.as_str());
                ChurnCustomer {
                    name: customer.and_then(|c| c.display_name()),
                    email: customer.and_then(|c| c.email.clone()),
                    customer_id: aggregate.customer_id,
                    total_spent: aggregate.total_spent,
                    order_count: aggregate.order_count,
                    days_since_last_order: aggregate.days_since_last_order,
                    first_order_date: aggregate.first_order_date,
                    last_order_date: aggregate.last_order_date,
                    prediction,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.prediction
                .risk_score
                .total_cmp(&a.prediction.risk_score)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });

        let summary = summarize(&rows);
        let risk_segments = risk_segments(&rows);
        let churn_trend = self.bucketer.churn_trend(&window, &rows);
        let cohort_trend = self.bucketer.cohort_churn_trend(&window, &rows);

        metrics::counter!("retention.churn.customers_scored").increment(rows.len() as u64);
        metrics::gauge!("retention.churn.revenue_at_risk").set(summary.total_revenue_at_risk);

        debug!(
            merchant_id = %context.merchant_id,
            customers = summary.total_customers,
            high_risk = summary.high_risk,
            churn_rate = summary.churn_rate,
            "Churn analytics computed"
        );

        Ok(ChurnAnalytics {
            merchant_id: context.merchant_id.clone(),
            currency: context.settings.currency.clone(),
            window,
            summary,
            churn_trend,
            cohort_trend,
            risk_segments,
            customers: rows,
        })
    }
}

fn count_band(rows: &[ChurnCustomer], band: ChurnBand) -> u32 {
    rows.iter().filter(|r| r.prediction.band == band).count() as u32
}

fn summarize(rows: &[ChurnCustomer]) -> ChurnSummary {
    let total = rows.len() as f64;
    let high_risk = count_band(rows, ChurnBand::High);

    ChurnSummary {
        total_customers: rows.len() as u32,
        high_risk,
        medium_risk: count_band(rows, ChurnBand::Medium),
        low_risk: count_band(rows, ChurnBand::Low),
        churn_rate: safe_div(high_risk as f64 * 100.0, total),
        avg_risk_score: safe_div(rows.iter().map(|r| r.prediction.risk_score).sum(), total),
        total_revenue_at_risk: rows.iter().map(|r| r.prediction.revenue_at_risk).sum(),
        avg_confidence: safe_div(rows.iter().map(|r| r.prediction.confidence).sum(), total),
    }
}

fn risk_segments(rows: &[ChurnCustomer]) -> Vec<RiskSegmentSummary> {
    let total = rows.len() as f64;
    ChurnBand::ALL
        .iter()
        .map(|&band| {
            let members: Vec<&ChurnPrediction> = rows
                .iter()
                .map(|r| &r.prediction)
                .filter(|p| p.band == band)
                .collect();
            let count = members.len() as f64;
            RiskSegmentSummary {
                band,
                count: members.len() as u32,
                percentage: safe_div(count * 100.0, total),
                revenue_at_risk: members.iter().map(|p| p.revenue_at_risk).sum(),
                avg_risk_score: safe_div(members.iter().map(|p| p.risk_score).sum(), count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use retention_core::types::MerchantSettings;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some(id.to_uppercase()),
            email: Some(format!("{id}@example.com")),
            created_at: ts(2023, 1, 1),
        }
    }

    fn order(id: &str, customer: &str, at: DateTime<Utc>, total: f64) -> Order {
        Order {
            id: id.to_string(),
            customer_id: Some(customer.to_string()),
            created_at: at,
            total_price: total,
            line_items: vec![],
        }
    }

    fn context() -> MerchantContext {
        MerchantContext::new("shop-1", MerchantSettings::default()).unwrap()
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(ts(2024, 1, 1), ts(2024, 3, 31)).unwrap()
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(ChurnBand::from_score(100.0), ChurnBand::High);
        assert_eq!(ChurnBand::from_score(70.0), ChurnBand::High);
        assert_eq!(ChurnBand::from_score(69.999), ChurnBand::Medium);
        assert_eq!(ChurnBand::from_score(40.0), ChurnBand::Medium);
        assert_eq!(ChurnBand::from_score(39.999), ChurnBand::Low);
        assert_eq!(ChurnBand::from_score(0.0), ChurnBand::Low);
    }

    #[test]
    fn test_confidence_components() {
        let classifier = ChurnClassifier::new(90, &window());
        let aggregator = WindowedAggregator::new(window());
        let orders: Vec<Order> = (1..=5)
            .map(|i| order(&format!("o{i}"), "c1", ts(2024, 3, i), 20.0))
            .collect();
        let agg = &aggregator.aggregate(&[customer("c1")], &orders)[0];
        // full window, recent orders, 5+ orders
        assert_eq!(classifier.confidence(agg), 100.0);

        let empty = &aggregator.aggregate(&[customer("c2")], &[])[0];
        assert_eq!(classifier.confidence(empty), 40.0);

        let short = AnalysisWindow::new(ts(2024, 3, 16), ts(2024, 3, 31)).unwrap();
        let classifier = ChurnClassifier::new(90, &short);
        assert_eq!(classifier.confidence(empty), 20.0);
    }

    #[test]
    fn test_inactive_big_spender_is_high_risk() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        // Historic spend lives outside the window.
        let orders = vec![order("old", "c1", ts(2023, 6, 1), 1000.0)];
        let report = analyzer
            .compute_churn_analytics(&context(), &[customer("c1")], &orders, &window())
            .unwrap();

        let prediction = &report.customers[0].prediction;
        assert_eq!(prediction.band, ChurnBand::High);
        assert_eq!(prediction.factors[0].score, 100.0);
        assert_eq!(prediction.factors[2].score, 100.0);
        assert_eq!(report.customers[0].total_spent, 0.0);
        assert_eq!(prediction.revenue_at_risk, 0.0);
    }

    #[test]
    fn test_historic_spend_without_recent_orders_is_high_risk() {
        let aggregate = CustomerAggregate {
            customer_id: "c1".to_string(),
            orders_in_window: vec![],
            total_spent: 1000.0,
            order_count: 0,
            avg_order_value: 0.0,
            days_since_last_order: 999,
            days_since_first_order: 999,
            order_frequency_per_month: 0.0,
            first_order_date: None,
            last_order_date: None,
        };
        let factors = RiskFactorModel::new(&MerchantSettings::default()).score(&aggregate);
        let prediction = ChurnClassifier::new(90, &window()).classify(&aggregate, factors);

        // 35 + 20 + 20 + 6 + 0.5
        assert!((prediction.risk_score - 81.5).abs() < 1e-9);
        assert_eq!(prediction.band, ChurnBand::High);
        assert!((prediction.revenue_at_risk - 815.0).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_at_risk_scales_with_spend() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        let orders = vec![order("o1", "c1", ts(2024, 1, 2), 1000.0)];
        let report = analyzer
            .compute_churn_analytics(&context(), &[customer("c1")], &orders, &window())
            .unwrap();
        let p = &report.customers[0].prediction;
        assert!((p.revenue_at_risk - 1000.0 * p.risk_score / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_customer_counted_once() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        let orders = vec![order("o1", "c1", ts(2024, 3, 20), 500.0)];
        let report = analyzer
            .compute_churn_analytics(&context(), &[customer("c1"), customer("c1")], &orders, &window())
            .unwrap();

        assert_eq!(report.customers.len(), 1);
        assert_eq!(report.summary.total_customers, 1);
        assert_eq!(report.summary.high_risk, 0);
        assert_eq!(report.summary.churn_rate, 0.0);
        assert_eq!(report.customers[0].prediction.band, ChurnBand::Low);
    }

    #[test]
    fn test_empty_input_yields_zeroed_report() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        let report = analyzer
            .compute_churn_analytics(&context(), &[], &[], &window())
            .unwrap();
        assert_eq!(report.summary.churn_rate, 0.0);
        assert_eq!(report.summary.avg_risk_score, 0.0);
        assert!(report.customers.is_empty());
        assert_eq!(report.risk_segments.len(), 3);
        assert!(report.risk_segments.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }

    #[test]
    fn test_customers_sorted_by_risk() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        let customers = vec![customer("a"), customer("b"), customer("c")];
        // b: single order at the window start, 90 days stale -> 78
        let mut orders = vec![order("b1", "b", ts(2024, 1, 1), 80.0)];
        for d in 1..=6 {
            orders.push(order(&format!("c{d}"), "c", ts(2024, 3, d * 4), 300.0));
        }
        let report = analyzer
            .compute_churn_analytics(&context(), &customers, &orders, &window())
            .unwrap();

        let ids: Vec<&str> = report.customers.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.customers[2].prediction.band, ChurnBand::Low);
        assert_eq!(report.summary.high_risk, 2);
        assert!((report.summary.churn_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.customers[0].name.as_deref(), Some("Test A"));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let analyzer = ChurnAnalyzer::new(&EngineConfig::default());
        let ctx = MerchantContext {
            merchant_id: "shop-1".to_string(),
            settings: MerchantSettings {
                churn_period_days: 0,
                currency: "USD".to_string(),
            },
        };
        assert!(analyzer
            .compute_churn_analytics(&ctx, &[], &[], &window())
            .is_err());
    }
}
