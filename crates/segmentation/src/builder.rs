//! Rule builder: fluent API for constructing segment rules.

use crate::engine::{CustomerSegment, SegmentRule};
use crate::predicates::{ComparisonOperator, LogicalOperator, Metric, Predicate, PredicateGroup};

pub struct RuleBuilder {
    segment: CustomerSegment,
    description: Option<String>,
    predicates: Vec<Predicate>,
    groups: Vec<PredicateGroup>,
    operator: LogicalOperator,
}

impl RuleBuilder {
    pub fn new(segment: CustomerSegment) -> Self {
        Self {
            segment,
            description: None,
            predicates: Vec::new(),
            groups: Vec::new(),
            operator: LogicalOperator::And,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_or(mut self) -> Self {
        self.operator = LogicalOperator::Or;
        self
    }

    pub fn metric_equals(mut self, metric: Metric, value: f64) -> Self {
        self.predicates
            .push(Predicate::new(metric, ComparisonOperator::Equals, value));
        self
    }

    pub fn metric_at_most(mut self, metric: Metric, value: f64) -> Self {
        self.predicates
            .push(Predicate::new(metric, ComparisonOperator::LessThanOrEqual, value));
        self
    }

    pub fn metric_at_least(mut self, metric: Metric, value: f64) -> Self {
        self.predicates
            .push(Predicate::new(metric, ComparisonOperator::GreaterThanOrEqual, value));
        self
    }

    pub fn metric_gt(mut self, metric: Metric, value: f64) -> Self {
        self.predicates
            .push(Predicate::new(metric, ComparisonOperator::GreaterThan, value));
        self
    }

    pub fn group(mut self, group: PredicateGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> SegmentRule {
        SegmentRule {
            segment: self.segment,
            description: self.description,
            criteria: PredicateGroup {
                operator: self.operator,
                predicates: self.predicates,
                groups: self.groups,
            },
        }
    }
}
