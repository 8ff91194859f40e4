//! Threshold clustering over two numeric dimensions.
//!
//! Entities are bucketed by a caller-supplied assignment into a fixed label
//! set. Cluster ids come from the label, so output order never depends on
//! which entity happened to come first.

use ndarray::{Array2, Axis};
use retention_analytics::CustomerAggregate;
use retention_core::config::ClusteringConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A fixed cluster label with a stable ordinal.
pub trait ClusterLabel: Copy {
    fn cluster_id(&self) -> u32;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
}

/// How to read an entity's id and its two clustering dimensions.
pub struct DimensionAccessors<E> {
    pub entity_id: fn(&E) -> String,
    pub x: fn(&E) -> f64,
    pub y: fn(&E) -> f64,
    pub x_name: &'static str,
    pub y_name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub entity_id: String,
    pub cluster_id: u32,
    pub cluster_label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterCenter {
    pub cluster_id: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: u32,
    pub cluster_label: String,
    pub member_count: u32,
    pub centroid: ClusterCenter,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterResult {
    pub x_dimension: String,
    pub y_dimension: String,
    pub cluster_summaries: Vec<ClusterSummary>,
    /// Entity input order.
    pub points: Vec<ClusterAssignment>,
    pub centers: Vec<ClusterCenter>,
}

struct Bucket<L> {
    label: L,
    coords: Vec<f64>,
}

/// Assign each entity a label and summarize the non-empty clusters.
pub fn compute_clusters<E, L, F>(
    entities: &[E],
    accessors: &DimensionAccessors<E>,
    assign: F,
) -> ClusterResult
where
    L: ClusterLabel,
    F: Fn(&E) -> L,
{
    let mut buckets: BTreeMap<u32, Bucket<L>> = BTreeMap::new();
    let mut points = Vec::with_capacity(entities.len());

    for entity in entities {
        let label = assign(entity);
        let (x, y) = ((accessors.x)(entity), (accessors.y)(entity));
        let bucket = buckets.entry(label.cluster_id()).or_insert_with(|| Bucket {
            label,
            coords: Vec::new(),
        });
        bucket.coords.extend_from_slice(&[x, y]);

        points.push(ClusterAssignment {
            entity_id: (accessors.entity_id)(entity),
            cluster_id: label.cluster_id(),
            cluster_label: label.name().to_string(),
            x,
            y,
        });
    }

    let mut cluster_summaries = Vec::with_capacity(buckets.len());
    let mut centers = Vec::with_capacity(buckets.len());
    for (cluster_id, bucket) in buckets {
        let member_count = (bucket.coords.len() / 2) as u32;
        let center = centroid(cluster_id, bucket.coords);
        centers.push(center.clone());
        cluster_summaries.push(ClusterSummary {
            cluster_id,
            cluster_label: bucket.label.name().to_string(),
            member_count,
            centroid: center,
            description: bucket.label.description().to_string(),
        });
    }

    debug!(
        entities = entities.len(),
        clusters = cluster_summaries.len(),
        x = accessors.x_name,
        y = accessors.y_name,
        "Clusters computed"
    );

    ClusterResult {
        x_dimension: accessors.x_name.to_string(),
        y_dimension: accessors.y_name.to_string(),
        cluster_summaries,
        points,
        centers,
    }
}

fn centroid(cluster_id: u32, coords: Vec<f64>) -> ClusterCenter {
    let rows = coords.len() / 2;
    let mean = Array2::from_shape_vec((rows, 2), coords)
        .ok()
        .and_then(|m| m.mean_axis(Axis(0)));
    match mean {
        Some(m) => ClusterCenter {
            cluster_id,
            x: m[0],
            y: m[1],
        },
        None => ClusterCenter {
            cluster_id,
            x: 0.0,
            y: 0.0,
        },
    }
}

// ─── Customer Clusters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerCluster {
    Champions,
    BigSpenders,
    FrequentBuyers,
    Occasional,
}

impl CustomerCluster {
    pub fn assign(aggregate: &CustomerAggregate, config: &ClusteringConfig) -> Self {
        let high_value = aggregate.total_spent > config.high_value_spend;
        let frequent = aggregate.order_count > config.frequent_order_count;
        match (high_value, frequent) {
            (true, true) => CustomerCluster::Champions,
            (true, false) => CustomerCluster::BigSpenders,
            (false, true) => CustomerCluster::FrequentBuyers,
            (false, false) => CustomerCluster::Occasional,
        }
    }
}

impl ClusterLabel for CustomerCluster {
    fn cluster_id(&self) -> u32 {
        *self as u32
    }

    fn name(&self) -> &'static str {
        match self {
            CustomerCluster::Champions => "champions",
            CustomerCluster::BigSpenders => "big_spenders",
            CustomerCluster::FrequentBuyers => "frequent_buyers",
            CustomerCluster::Occasional => "occasional",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            CustomerCluster::Champions => "High spend and frequent orders",
            CustomerCluster::BigSpenders => "High spend, infrequent orders",
            CustomerCluster::FrequentBuyers => "Frequent orders, modest spend",
            CustomerCluster::Occasional => "Low spend and infrequent orders",
        }
    }
}

pub fn customer_accessors() -> DimensionAccessors<CustomerAggregate> {
    DimensionAccessors {
        entity_id: |a| a.customer_id.clone(),
        x: |a| a.total_spent,
        y: |a| a.order_count as f64,
        x_name: "total_spent",
        y_name: "order_count",
    }
}

/// Spend × order-count clusters for every aggregate.
pub fn cluster_customers(aggregates: &[CustomerAggregate], config: &ClusteringConfig) -> ClusterResult {
    let result = compute_clusters(aggregates, &customer_accessors(), |a| {
        CustomerCluster::assign(a, config)
    });
    metrics::counter!("retention.clusters.customers_assigned").increment(result.points.len() as u64);
    result
}
