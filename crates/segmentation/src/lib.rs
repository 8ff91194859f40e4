//! Customer segmentation: rule-based lifecycle segments and two-dimensional
//! threshold clusters for customers and products.

pub mod builder;
pub mod clustering;
pub mod engine;
pub mod predicates;
pub mod products;

pub use builder::RuleBuilder;
pub use clustering::{
    cluster_customers, compute_clusters, ClusterLabel, ClusterResult, CustomerCluster,
    DimensionAccessors,
};
pub use engine::{
    default_rules, segment_summary, CustomerSegment, SegmentAssignment, SegmentClassifier,
    SegmentRule, SegmentSummary,
};
pub use products::{cluster_products, ProductCluster, ProductMetrics};
