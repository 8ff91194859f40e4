//! Windowed aggregation: folds raw orders into one aggregate per customer.
//!
//! Every downstream model (risk, LTV, segments, clusters) reads these
//! aggregates instead of raw orders.

use chrono::{DateTime, Utc};
use retention_core::types::{safe_div, AnalysisWindow, Customer, Order};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// `days_since_last_order` for a customer with no orders in the window.
pub const NO_ACTIVITY_DAYS: i64 = 999;

/// Per-customer view of the orders inside one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub orders_in_window: Vec<Order>,
    pub total_spent: f64,
    pub order_count: u32,
    pub avg_order_value: f64,
    /// Days from the last order to the window end, or `NO_ACTIVITY_DAYS`.
    pub days_since_last_order: i64,
    /// Days from the first order to the window end, or `NO_ACTIVITY_DAYS`.
    pub days_since_first_order: i64,
    pub order_frequency_per_month: f64,
    pub first_order_date: Option<DateTime<Utc>>,
    pub last_order_date: Option<DateTime<Utc>>,
}

impl CustomerAggregate {
    pub fn has_orders(&self) -> bool {
        self.order_count > 0
    }
}

/// Groups orders by customer inside a fixed window.
#[derive(Debug, Clone, Copy)]
pub struct WindowedAggregator {
    window: AnalysisWindow,
}

impl WindowedAggregator {
    pub fn new(window: AnalysisWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    /// Months used as the frequency denominator, never below one.
    pub fn window_months(&self) -> f64 {
        (self.window.days() as f64 / 30.0).max(1.0)
    }

    /// Build one aggregate per distinct customer id, in customer input order.
    /// A repeated id keeps its first occurrence.
    ///
    /// Orders outside the window or without a customer are ignored even if
    /// the caller already filtered them.
    pub fn aggregate(&self, customers: &[Customer], orders: &[Order]) -> Vec<CustomerAggregate> {
        let mut by_customer: HashMap<&str, Vec<&Order>> = HashMap::new();
        let mut outside_window = 0usize;
        let mut unattributed = 0usize;

        for order in orders {
            let Some(customer_id) = order.customer_id.as_deref() else {
                unattributed += 1;
                continue;
            };
            if !self.window.contains(&order.created_at) {
                outside_window += 1;
                continue;
            }
            by_customer.entry(customer_id).or_default().push(order);
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(customers.len());
        let distinct: Vec<&Customer> = customers
            .iter()
            .filter(|c| seen.insert(c.id.as_str()))
            .collect();
        let duplicates = customers.len() - distinct.len();
        if duplicates > 0 {
            warn!(duplicates, "Ignored repeated customer ids in the customer list");
        }

        let known = distinct.len();
        let aggregates: Vec<CustomerAggregate> = distinct
            .into_iter()
            .map(|c| {
                let mut own = by_customer.remove(c.id.as_str()).unwrap_or_default();
                own.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
                self.build(&c.id, own)
            })
            .collect();

        debug!(
            customers = known,
            orders = orders.len(),
            outside_window,
            unattributed,
            unknown_customers = by_customer.len(),
            "Aggregated orders by customer"
        );
        if !by_customer.is_empty() {
            warn!(
                unknown_customers = by_customer.len(),
                skipped_orders = by_customer.values().map(Vec::len).sum::<usize>(),
                "Skipped orders for customers missing from the customer list"
            );
        }

        aggregates
    }

    fn build(&self, customer_id: &str, orders: Vec<&Order>) -> CustomerAggregate {
        let order_count = orders.len() as u32;
        let total_spent: f64 = orders.iter().map(|o| o.total_price).sum();
        let first_order_date = orders.first().map(|o| o.created_at);
        let last_order_date = orders.last().map(|o| o.created_at);

        let days_since = |ts: Option<DateTime<Utc>>| {
            ts.map(|t| (self.window.end - t).num_days().max(0))
                .unwrap_or(NO_ACTIVITY_DAYS)
        };

        CustomerAggregate {
            customer_id: customer_id.to_string(),
            orders_in_window: orders.into_iter().cloned().collect(),
            total_spent,
            order_count,
            avg_order_value: safe_div(total_spent, order_count as f64),
            days_since_last_order: days_since(last_order_date),
            days_since_first_order: days_since(first_order_date),
            order_frequency_per_month: order_count as f64 / self.window_months(),
            first_order_date,
            last_order_date,
        }
    }
}
