//! Segment classification: an ordered rule cascade over customer aggregates.
//!
//! Rules are evaluated top to bottom and the first match wins. The default
//! cascade ends in a catch-all, so every customer gets exactly one segment.

use retention_analytics::CustomerAggregate;
use retention_core::types::safe_div;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::builder::RuleBuilder;
use crate::predicates::{Metric, PredicateGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    Inactive,
    NewCustomer,
    OneTimeBuyer,
    VipCustomer,
    LoyalCustomer,
    PotentialLoyalist,
    RegularCustomer,
    AtRisk,
    Churned,
}

impl CustomerSegment {
    pub const ALL: [CustomerSegment; 9] = [
        CustomerSegment::Inactive,
        CustomerSegment::NewCustomer,
        CustomerSegment::OneTimeBuyer,
        CustomerSegment::VipCustomer,
        CustomerSegment::LoyalCustomer,
        CustomerSegment::PotentialLoyalist,
        CustomerSegment::RegularCustomer,
        CustomerSegment::AtRisk,
        CustomerSegment::Churned,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            CustomerSegment::Inactive => "Inactive",
            CustomerSegment::NewCustomer => "New Customer",
            CustomerSegment::OneTimeBuyer => "One-Time Buyer",
            CustomerSegment::VipCustomer => "VIP Customer",
            CustomerSegment::LoyalCustomer => "Loyal Customer",
            CustomerSegment::PotentialLoyalist => "Potential Loyalist",
            CustomerSegment::RegularCustomer => "Regular Customer",
            CustomerSegment::AtRisk => "At Risk",
            CustomerSegment::Churned => "Churned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub segment: CustomerSegment,
    pub description: Option<String>,
    pub criteria: PredicateGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAssignment {
    pub customer_id: String,
    pub segment: CustomerSegment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: CustomerSegment,
    pub name: String,
    pub count: u32,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub percentage: f64,
}

/// The standard lifecycle cascade.
pub fn default_rules() -> Vec<SegmentRule> {
    vec![
        RuleBuilder::new(CustomerSegment::Inactive)
            .description("No orders in the window")
            .metric_equals(Metric::OrderCount, 0.0)
            .build(),
        RuleBuilder::new(CustomerSegment::NewCustomer)
            .description("Single order within the last 30 days")
            .metric_equals(Metric::OrderCount, 1.0)
            .metric_at_most(Metric::DaysSinceLastOrder, 30.0)
            .build(),
        RuleBuilder::new(CustomerSegment::OneTimeBuyer)
            .description("Single order, more than 30 days ago")
            .metric_equals(Metric::OrderCount, 1.0)
            .build(),
        RuleBuilder::new(CustomerSegment::VipCustomer)
            .description("Recent, monthly buyer with at least 500 spent")
            .metric_at_most(Metric::DaysSinceLastOrder, 30.0)
            .metric_at_least(Metric::OrderFrequency, 1.0)
            .metric_at_least(Metric::TotalSpent, 500.0)
            .build(),
        RuleBuilder::new(CustomerSegment::LoyalCustomer)
            .description("Recent, monthly buyer")
            .metric_at_most(Metric::DaysSinceLastOrder, 30.0)
            .metric_at_least(Metric::OrderFrequency, 1.0)
            .build(),
        RuleBuilder::new(CustomerSegment::PotentialLoyalist)
            .description("Ordered within 60 days with at least 300 spent")
            .metric_at_most(Metric::DaysSinceLastOrder, 60.0)
            .metric_at_least(Metric::TotalSpent, 300.0)
            .build(),
        RuleBuilder::new(CustomerSegment::RegularCustomer)
            .description("Ordered within 60 days")
            .metric_at_most(Metric::DaysSinceLastOrder, 60.0)
            .build(),
        RuleBuilder::new(CustomerSegment::AtRisk)
            .description("Ordered within 180 days")
            .metric_at_most(Metric::DaysSinceLastOrder, 180.0)
            .build(),
        RuleBuilder::new(CustomerSegment::Churned)
            .description("No order in the last 180 days")
            .build(),
    ]
}

pub struct SegmentClassifier {
    rules: Vec<SegmentRule>,
}

impl SegmentClassifier {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<SegmentRule>) -> Self {
        info!(rules = rules.len(), "Segment classifier initialized");
        Self { rules }
    }

    /// First rule whose criteria match.
    pub fn matched_rule(&self, aggregate: &CustomerAggregate) -> Option<&SegmentRule> {
        self.rules.iter().find(|r| r.criteria.matches(aggregate))
    }

    /// Falls back to `Churned` when a custom rule list has no catch-all.
    pub fn classify(&self, aggregate: &CustomerAggregate) -> CustomerSegment {
        self.matched_rule(aggregate)
            .map(|r| r.segment)
            .unwrap_or(CustomerSegment::Churned)
    }

    /// One assignment per aggregate, in input order.
    pub fn segment_customers(&self, aggregates: &[CustomerAggregate]) -> Vec<SegmentAssignment> {
        let assignments: Vec<SegmentAssignment> = aggregates
            .iter()
            .map(|agg| SegmentAssignment {
                customer_id: agg.customer_id.clone(),
                segment: self.classify(agg),
            })
            .collect();

        metrics::counter!("retention.segments.assigned").increment(assignments.len() as u64);
        debug!(customers = assignments.len(), "Customers segmented");
        assignments
    }
}

impl Default for SegmentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-segment totals in enum order. Segments with no members are reported
/// with zeros.
pub fn segment_summary(
    aggregates: &[CustomerAggregate],
    assignments: &[SegmentAssignment],
) -> Vec<SegmentSummary> {
    let total = assignments.len() as f64;

    CustomerSegment::ALL
        .iter()
        .map(|&segment| {
            let mut count = 0u32;
            let mut total_revenue = 0.0;
            let mut total_orders = 0u64;
            for (agg, assignment) in aggregates.iter().zip(assignments) {
                if assignment.segment == segment {
                    count += 1;
                    total_revenue += agg.total_spent;
                    total_orders += agg.order_count as u64;
                }
            }
            SegmentSummary {
                segment,
                name: segment.display_name().to_string(),
                count,
                total_revenue,
                avg_order_value: safe_div(total_revenue, total_orders as f64),
                percentage: safe_div(count as f64 * 100.0, total),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(id: &str, order_count: u32, days: i64, spent: f64, frequency: f64) -> CustomerAggregate {
        CustomerAggregate {
            customer_id: id.to_string(),
            orders_in_window: vec![],
            total_spent: spent,
            order_count,
            avg_order_value: safe_div(spent, order_count as f64),
            days_since_last_order: days,
            days_since_first_order: days,
            order_frequency_per_month: frequency,
            first_order_date: None,
            last_order_date: None,
        }
    }

    #[test]
    fn test_cascade_covers_every_label() {
        let classifier = SegmentClassifier::new();
        let cases = [
            (aggregate("a", 0, 999, 0.0, 0.0), CustomerSegment::Inactive),
            (aggregate("b", 1, 10, 40.0, 0.33), CustomerSegment::NewCustomer),
            (aggregate("c", 1, 45, 40.0, 0.33), CustomerSegment::OneTimeBuyer),
            (aggregate("d", 5, 10, 600.0, 1.67), CustomerSegment::VipCustomer),
            (aggregate("e", 5, 10, 200.0, 1.67), CustomerSegment::LoyalCustomer),
            (aggregate("f", 2, 50, 350.0, 0.67), CustomerSegment::PotentialLoyalist),
            (aggregate("g", 2, 10, 100.0, 0.67), CustomerSegment::RegularCustomer),
            (aggregate("h", 2, 120, 100.0, 0.67), CustomerSegment::AtRisk),
            (aggregate("i", 2, 200, 100.0, 0.67), CustomerSegment::Churned),
        ];
        for (agg, expected) in &cases {
            assert_eq!(classifier.classify(agg), *expected, "customer {}", agg.customer_id);
        }
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let classifier = SegmentClassifier::new();
        assert_eq!(
            classifier.classify(&aggregate("a", 1, 30, 10.0, 0.33)),
            CustomerSegment::NewCustomer
        );
        assert_eq!(
            classifier.classify(&aggregate("b", 3, 30, 500.0, 1.0)),
            CustomerSegment::VipCustomer
        );
        assert_eq!(
            classifier.classify(&aggregate("c", 2, 180, 10.0, 0.67)),
            CustomerSegment::AtRisk
        );
    }

    #[test]
    fn test_matched_rule_reports_first_match() {
        let classifier = SegmentClassifier::new();
        let agg = aggregate("a", 5, 10, 600.0, 1.67);
        let rule = classifier.matched_rule(&agg).unwrap();
        assert_eq!(rule.segment, CustomerSegment::VipCustomer);
    }

    #[test]
    fn test_custom_rules_without_catch_all_fall_back() {
        let classifier = SegmentClassifier::with_rules(vec![RuleBuilder::new(CustomerSegment::Inactive)
            .metric_equals(Metric::OrderCount, 0.0)
            .build()]);
        assert_eq!(
            classifier.classify(&aggregate("a", 2, 5, 10.0, 0.67)),
            CustomerSegment::Churned
        );
    }

    #[test]
    fn test_summary_in_enum_order() {
        let aggregates = vec![
            aggregate("a", 0, 999, 0.0, 0.0),
            aggregate("b", 5, 10, 600.0, 1.67),
            aggregate("c", 3, 5, 900.0, 1.0),
            aggregate("d", 1, 10, 50.0, 0.33),
        ];
        let classifier = SegmentClassifier::new();
        let assignments = classifier.segment_customers(&aggregates);
        let summary = segment_summary(&aggregates, &assignments);

        assert_eq!(summary.len(), 9);
        assert_eq!(
            summary.iter().map(|s| s.segment).collect::<Vec<_>>(),
            CustomerSegment::ALL.to_vec()
        );
        let vip = &summary[3];
        assert_eq!(vip.count, 2);
        assert_eq!(vip.total_revenue, 1500.0);
        assert_eq!(vip.avg_order_value, 187.5);
        assert_eq!(vip.percentage, 50.0);
        assert_eq!(summary[0].avg_order_value, 0.0);
        assert_eq!(summary[8].count, 0);
    }

    #[test]
    fn test_empty_population() {
        let summary = segment_summary(&[], &[]);
        assert!(summary.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }
}
