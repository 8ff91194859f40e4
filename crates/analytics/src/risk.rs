//! Five-factor churn risk model.
//!
//! Each factor maps one aggregate metric to a 0–100 score; the weighted sum
//! of the five scores is the customer's risk score. Weights total 100.

use retention_core::types::MerchantSettings;
use serde::Serialize;

use crate::aggregator::CustomerAggregate;

/// The five risk factors, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    Recency,
    Frequency,
    OrderCount,
    AverageOrderValue,
    CustomerValue,
}

impl RiskFactorKind {
    pub const ALL: [RiskFactorKind; 5] = [
        RiskFactorKind::Recency,
        RiskFactorKind::Frequency,
        RiskFactorKind::OrderCount,
        RiskFactorKind::AverageOrderValue,
        RiskFactorKind::CustomerValue,
    ];

    /// Share of the risk score this factor controls, out of 100.
    pub fn weight(&self) -> u32 {
        match self {
            RiskFactorKind::Recency => 35,
            RiskFactorKind::Frequency => 25,
            RiskFactorKind::OrderCount => 20,
            RiskFactorKind::AverageOrderValue => 10,
            RiskFactorKind::CustomerValue => 10,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RiskFactorKind::Recency => "Recency",
            RiskFactorKind::Frequency => "Frequency",
            RiskFactorKind::OrderCount => "Order Count",
            RiskFactorKind::AverageOrderValue => "Average Order Value",
            RiskFactorKind::CustomerValue => "Customer Value",
        }
    }
}

/// One scored factor for one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub kind: RiskFactorKind,
    pub name: String,
    pub raw_value: f64,
    pub weight: u32,
    pub score: f64,
    /// `score * weight / 100`.
    pub contribution: f64,
    pub description: String,
}

impl RiskFactor {
    fn new(kind: RiskFactorKind, raw_value: f64, score: f64, description: String) -> Self {
        let weight = kind.weight();
        Self {
            kind,
            name: kind.display_name().to_string(),
            raw_value,
            weight,
            score,
            contribution: score * weight as f64 / 100.0,
            description,
        }
    }
}

/// Scores customer aggregates against a merchant's churn period.
#[derive(Debug, Clone)]
pub struct RiskFactorModel {
    churn_period_days: u32,
}

impl RiskFactorModel {
    pub fn new(settings: &MerchantSettings) -> Self {
        Self {
            churn_period_days: settings.churn_period_days,
        }
    }

    /// Score all five factors, in `RiskFactorKind::ALL` order.
    pub fn score(&self, aggregate: &CustomerAggregate) -> Vec<RiskFactor> {
        vec![
            self.recency(aggregate),
            frequency(aggregate),
            order_count(aggregate),
            average_order_value(aggregate),
            customer_value(aggregate),
        ]
    }

    /// Recency thresholds scale with the churn period `T`.
    fn recency(&self, aggregate: &CustomerAggregate) -> RiskFactor {
        let days = aggregate.days_since_last_order as f64;
        let t = self.churn_period_days as f64;
        let score = if days >= t {
            100.0
        } else if days >= 0.67 * t {
            70.0
        } else if days >= 0.33 * t {
            40.0
        } else {
            10.0
        };
        let description = if aggregate.has_orders() {
            format!(
                "{} days since last order (churn period {} days)",
                aggregate.days_since_last_order, self.churn_period_days
            )
        } else {
            "No orders in the analysis window".to_string()
        };
        RiskFactor::new(RiskFactorKind::Recency, days, score, description)
    }
}

fn frequency(aggregate: &CustomerAggregate) -> RiskFactor {
    let per_month = aggregate.order_frequency_per_month;
    let score = if per_month < 0.5 {
        80.0
    } else if per_month < 1.0 {
        50.0
    } else if per_month < 2.0 {
        20.0
    } else {
        5.0
    };
    RiskFactor::new(
        RiskFactorKind::Frequency,
        per_month,
        score,
        format!("{per_month:.2} orders per month"),
    )
}

fn order_count(aggregate: &CustomerAggregate) -> RiskFactor {
    let count = aggregate.order_count;
    let score = match count {
        0 => 100.0,
        1 => 70.0,
        2..=3 => 40.0,
        _ => 10.0,
    };
    RiskFactor::new(
        RiskFactorKind::OrderCount,
        count as f64,
        score,
        format!("{count} orders in window"),
    )
}

/// Lower average order value means higher risk.
fn average_order_value(aggregate: &CustomerAggregate) -> RiskFactor {
    let aov = aggregate.avg_order_value;
    let score = if aov < 50.0 {
        60.0
    } else if aov < 100.0 {
        40.0
    } else if aov < 200.0 {
        20.0
    } else {
        5.0
    };
    RiskFactor::new(
        RiskFactorKind::AverageOrderValue,
        aov,
        score,
        format!("{aov:.2} average order value"),
    )
}

fn customer_value(aggregate: &CustomerAggregate) -> RiskFactor {
    let spent = aggregate.total_spent;
    let score = if spent < 100.0 {
        50.0
    } else if spent < 500.0 {
        30.0
    } else if spent < 1000.0 {
        15.0
    } else {
        5.0
    };
    RiskFactor::new(
        RiskFactorKind::CustomerValue,
        spent,
        score,
        format!("{spent:.2} spent in window"),
    )
}

/// Weighted sum of factor contributions, clamped to [0, 100].
pub fn risk_score(factors: &[RiskFactor]) -> f64 {
    factors
        .iter()
        .map(|f| f.contribution)
        .sum::<f64>()
        .clamp(0.0, 100.0)
}
