//! Predicate types and evaluation logic for segment rules.

use retention_analytics::CustomerAggregate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateGroup {
    pub operator: LogicalOperator,
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub groups: Vec<PredicateGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

/// Aggregate metric a predicate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    OrderCount,
    DaysSinceLastOrder,
    TotalSpent,
    OrderFrequency,
}

impl Metric {
    pub fn read(&self, aggregate: &CustomerAggregate) -> f64 {
        match self {
            Metric::OrderCount => aggregate.order_count as f64,
            Metric::DaysSinceLastOrder => aggregate.days_since_last_order as f64,
            Metric::TotalSpent => aggregate.total_spent,
            Metric::OrderFrequency => aggregate.order_frequency_per_month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub metric: Metric,
    pub operator: ComparisonOperator,
    pub value: f64,
}

impl Predicate {
    pub fn new(metric: Metric, operator: ComparisonOperator, value: f64) -> Self {
        Self {
            metric,
            operator,
            value,
        }
    }

    pub fn evaluate(&self, aggregate: &CustomerAggregate) -> bool {
        compare_numbers(self.metric.read(aggregate), &self.operator, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl PredicateGroup {
    /// A group that every aggregate satisfies.
    pub fn always() -> Self {
        Self {
            operator: LogicalOperator::And,
            predicates: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn matches(&self, aggregate: &CustomerAggregate) -> bool {
        match self.operator {
            LogicalOperator::And => {
                self.predicates.iter().all(|p| p.evaluate(aggregate))
                    && self.groups.iter().all(|g| g.matches(aggregate))
            }
            LogicalOperator::Or => {
                self.predicates.iter().any(|p| p.evaluate(aggregate))
                    || self.groups.iter().any(|g| g.matches(aggregate))
            }
        }
    }
}

pub fn compare_numbers(actual: f64, operator: &ComparisonOperator, expected: f64) -> bool {
    match operator {
        ComparisonOperator::Equals => actual == expected,
        ComparisonOperator::NotEquals => actual != expected,
        ComparisonOperator::GreaterThan => actual > expected,
        ComparisonOperator::GreaterThanOrEqual => actual >= expected,
        ComparisonOperator::LessThan => actual < expected,
        ComparisonOperator::LessThanOrEqual => actual <= expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(order_count: u32, days: i64, spent: f64) -> CustomerAggregate {
        CustomerAggregate {
            customer_id: "c1".to_string(),
            orders_in_window: vec![],
            total_spent: spent,
            order_count,
            avg_order_value: 0.0,
            days_since_last_order: days,
            days_since_first_order: days,
            order_frequency_per_month: order_count as f64 / 3.0,
            first_order_date: None,
            last_order_date: None,
        }
    }

    #[test]
    fn test_compare_numbers() {
        assert!(compare_numbers(3.0, &ComparisonOperator::Equals, 3.0));
        assert!(compare_numbers(3.0, &ComparisonOperator::LessThanOrEqual, 3.0));
        assert!(!compare_numbers(3.0, &ComparisonOperator::LessThan, 3.0));
        assert!(compare_numbers(4.0, &ComparisonOperator::GreaterThan, 3.0));
    }

    #[test]
    fn test_and_or_groups() {
        let agg = aggregate(2, 20, 150.0);
        let recent = Predicate::new(Metric::DaysSinceLastOrder, ComparisonOperator::LessThanOrEqual, 30.0);
        let big = Predicate::new(Metric::TotalSpent, ComparisonOperator::GreaterThanOrEqual, 500.0);

        let and = PredicateGroup {
            operator: LogicalOperator::And,
            predicates: vec![recent.clone(), big.clone()],
            groups: vec![],
        };
        let or = PredicateGroup {
            operator: LogicalOperator::Or,
            predicates: vec![recent, big],
            groups: vec![],
        };
        assert!(!and.matches(&agg));
        assert!(or.matches(&agg));
    }

    #[test]
    fn test_always_matches_and_empty_or_does_not() {
        let agg = aggregate(0, 999, 0.0);
        assert!(PredicateGroup::always().matches(&agg));
        let empty_or = PredicateGroup {
            operator: LogicalOperator::Or,
            predicates: vec![],
            groups: vec![],
        };
        assert!(!empty_or.matches(&agg));
    }
}
