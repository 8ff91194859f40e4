//! Retention analytics: windowed aggregation, five-factor churn risk,
//! lifetime value prediction, and trend series for charting.

pub mod aggregator;
pub mod churn;
pub mod ltv;
pub mod risk;
pub mod trend;

pub use aggregator::{CustomerAggregate, WindowedAggregator};
pub use churn::{ChurnAnalytics, ChurnAnalyzer, ChurnBand, ChurnClassifier, ChurnPrediction};
pub use ltv::{compute_ltv_predictions, summarize_ltv, LtvPrediction, LtvPredictor, LtvSegment};
pub use risk::{RiskFactor, RiskFactorKind, RiskFactorModel};
pub use trend::{Granularity, TrendBucketer};
