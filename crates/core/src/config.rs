use serde::Deserialize;
use std::path::Path;

use crate::types::MerchantSettings;

/// Root engine configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `RETENTION_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub merchant: MerchantSettings,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

// ─── Trend Config ───────────────────────────────────────────────────────────

/// How the daily churn trend distributes predictions over buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrategy {
    /// Integer-divide the window totals evenly across every bucket.
    EvenSplit,
    /// Attribute each prediction to the bucket of the customer's last order.
    PerBucket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_trend_strategy")]
    pub strategy: TrendStrategy,
    /// Ranges longer than this switch the cohort churn trend to quarters.
    #[serde(default = "default_quarterly_threshold_days")]
    pub quarterly_threshold_days: i64,
}

fn default_trend_strategy() -> TrendStrategy {
    TrendStrategy::PerBucket
}
fn default_quarterly_threshold_days() -> i64 {
    180
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            strategy: default_trend_strategy(),
            quarterly_threshold_days: default_quarterly_threshold_days(),
        }
    }
}

// ─── Clustering Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ClusteringConfig {
    /// Customers spending strictly more than this are high value.
    #[serde(default = "default_high_value_spend")]
    pub high_value_spend: f64,
    /// Customers with strictly more orders than this are frequent.
    #[serde(default = "default_frequent_order_count")]
    pub frequent_order_count: u32,
    /// Half-over-half revenue growth that marks a product as rising.
    #[serde(default = "default_product_growth_threshold")]
    pub product_growth_threshold: f64,
}

fn default_high_value_spend() -> f64 {
    500.0
}
fn default_frequent_order_count() -> u32 {
    3
}
fn default_product_growth_threshold() -> f64 {
    0.1
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            high_value_spend: default_high_value_spend(),
            frequent_order_count: default_frequent_order_count(),
            product_growth_threshold: default_product_growth_threshold(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merchant: MerchantSettings::default(),
            trend: TrendConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file and environment variables.
    /// Environment values win over file values.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("RETENTION_ENGINE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
