//! Product performance clustering: revenue × units with a growth signal.

use chrono::{DateTime, Utc};
use retention_core::config::ClusteringConfig;
use retention_core::types::{safe_div, AnalysisWindow, Order};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::clustering::{compute_clusters, ClusterLabel, ClusterResult, DimensionAccessors};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMetrics {
    pub product_id: String,
    pub title: String,
    pub revenue: f64,
    pub units: u64,
    /// Second-half revenue relative to first-half revenue of the window.
    pub growth: f64,
}

#[derive(Default)]
struct ProductTotals {
    title: String,
    units: u64,
    first_half: f64,
    second_half: f64,
}

impl ProductMetrics {
    /// One entry per product sold in the window, ordered by product id.
    pub fn from_orders(orders: &[Order], window: &AnalysisWindow) -> Vec<ProductMetrics> {
        let midpoint: DateTime<Utc> = window.start + (window.end - window.start) / 2;
        let mut totals: BTreeMap<&str, ProductTotals> = BTreeMap::new();

        for order in orders.iter().filter(|o| window.contains(&o.created_at)) {
            for item in &order.line_items {
                let entry = totals.entry(item.product_id.as_str()).or_default();
                if entry.title.is_empty() {
                    entry.title = item.title.clone();
                }
                entry.units += item.quantity as u64;
                if order.created_at < midpoint {
                    entry.first_half += item.line_total();
                } else {
                    entry.second_half += item.line_total();
                }
            }
        }

        totals
            .into_iter()
            .map(|(product_id, t)| ProductMetrics {
                product_id: product_id.to_string(),
                title: t.title,
                revenue: t.first_half + t.second_half,
                units: t.units,
                growth: growth_rate(t.first_half, t.second_half),
            })
            .collect()
    }
}

fn growth_rate(first_half: f64, second_half: f64) -> f64 {
    if first_half > 0.0 {
        safe_div(second_half - first_half, first_half)
    } else if second_half > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Linearly interpolated quantile of an unsorted sample; 0 when empty.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileThresholds {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

impl QuantileThresholds {
    pub fn of(values: &[f64]) -> Self {
        Self {
            p25: quantile(values, 0.25),
            p50: quantile(values, 0.50),
            p75: quantile(values, 0.75),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCluster {
    Star,
    CashCow,
    Rising,
    Niche,
    Underperformer,
}

impl ClusterLabel for ProductCluster {
    fn cluster_id(&self) -> u32 {
        *self as u32
    }

    fn name(&self) -> &'static str {
        match self {
            ProductCluster::Star => "star",
            ProductCluster::CashCow => "cash_cow",
            ProductCluster::Rising => "rising",
            ProductCluster::Niche => "niche",
            ProductCluster::Underperformer => "underperformer",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ProductCluster::Star => "Top-quartile revenue with strong volume and no decline",
            ProductCluster::CashCow => "Above-median revenue",
            ProductCluster::Rising => "Revenue growing between window halves",
            ProductCluster::Niche => "Bottom-quartile unit volume",
            ProductCluster::Underperformer => "Below-median revenue without growth",
        }
    }
}

/// Cut-points for the product population.
#[derive(Debug, Clone, Copy)]
pub struct ProductClassifier {
    pub revenue: QuantileThresholds,
    pub units: QuantileThresholds,
    pub growth_threshold: f64,
}

impl ProductClassifier {
    pub fn fit(products: &[ProductMetrics], config: &ClusteringConfig) -> Self {
        let revenue: Vec<f64> = products.iter().map(|p| p.revenue).collect();
        let units: Vec<f64> = products.iter().map(|p| p.units as f64).collect();
        Self {
            revenue: QuantileThresholds::of(&revenue),
            units: QuantileThresholds::of(&units),
            growth_threshold: config.product_growth_threshold,
        }
    }

    pub fn classify(&self, product: &ProductMetrics) -> ProductCluster {
        let units = product.units as f64;
        if product.revenue >= self.revenue.p75 && units >= self.units.p50 && product.growth >= 0.0 {
            ProductCluster::Star
        } else if product.revenue >= self.revenue.p50 {
            ProductCluster::CashCow
        } else if product.growth > self.growth_threshold {
            ProductCluster::Rising
        } else if units < self.units.p25 {
            ProductCluster::Niche
        } else {
            ProductCluster::Underperformer
        }
    }
}

pub fn product_accessors() -> DimensionAccessors<ProductMetrics> {
    DimensionAccessors {
        entity_id: |p| p.product_id.clone(),
        x: |p| p.revenue,
        y: |p| p.units as f64,
        x_name: "revenue",
        y_name: "units",
    }
}

/// Revenue × units clusters for every product sold in the window.
pub fn cluster_products(orders: &[Order], window: &AnalysisWindow, config: &ClusteringConfig) -> ClusterResult {
    let products = ProductMetrics::from_orders(orders, window);
    let classifier = ProductClassifier::fit(&products, config);
    let result = compute_clusters(&products, &product_accessors(), |p| classifier.classify(p));
    metrics::counter!("retention.clusters.products_assigned").increment(result.points.len() as u64);
    result
}
