//! Retention Engine: churn, lifetime value, cohort and segmentation reports
//! for a merchant's exported customer and order history.
//!
//! Reads a JSON dataset, runs one analysis, and prints the report as pretty
//! JSON on stdout. Logs go to stderr.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use retention_analytics::ltv::LtvSummary;
use retention_analytics::{
    compute_ltv_predictions, summarize_ltv, ChurnAnalyzer, LtvPrediction, TrendBucketer,
    WindowedAggregator,
};
use retention_core::config::EngineConfig;
use retention_core::types::{AnalysisWindow, MerchantContext, Order};
use retention_core::{InMemoryDataSource, MerchantDataset, RetentionDataSource};
use retention_reporting::{compute_cohort_analysis, retention_matrix, CohortPoint, CohortRow};
use retention_segmentation::{
    cluster_customers, cluster_products, segment_summary, ClusterResult, SegmentAssignment,
    SegmentClassifier, SegmentSummary,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "retention-engine")]
#[command(about = "Customer retention analytics over exported merchant data")]
#[command(version)]
struct Cli {
    /// JSON dataset: {merchant_id, settings?, customers[], orders[]}
    #[arg(long, short = 'd')]
    dataset: PathBuf,

    /// Optional TOML config file
    #[arg(long, short = 'c', env = "RETENTION_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Merchant identifier (overrides the dataset's)
    #[arg(long)]
    merchant: Option<String>,

    /// Churn period in days (overrides merchant settings)
    #[arg(long)]
    churn_period_days: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Five-factor churn risk report with trends and risk bands
    Churn(WindowArgs),
    /// Lifetime value predictions and summary
    Ltv {
        /// Reference instant (RFC 3339 or YYYY-MM-DD); defaults to the latest order
        #[arg(long, value_parser = parse_timestamp)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Acquisition cohort retention and revenue
    Cohorts {
        /// Group cohorts by calendar year instead of month
        #[arg(long, default_value_t = false)]
        yearly: bool,
    },
    /// Lifecycle segment per customer plus segment totals
    Segments(WindowArgs),
    /// Spend × frequency customer clusters
    Clusters(WindowArgs),
    /// Revenue × units product clusters
    Products(WindowArgs),
}

#[derive(Args, Debug, Clone)]
struct WindowArgs {
    /// Window start (RFC 3339 or YYYY-MM-DD); overrides --days
    #[arg(long, value_parser = parse_timestamp)]
    start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339 or YYYY-MM-DD); defaults to the latest order
    #[arg(long, value_parser = parse_timestamp)]
    end: Option<DateTime<Utc>>,

    /// Trailing window length in days; defaults to the churn period
    #[arg(long)]
    days: Option<i64>,
}

#[derive(Serialize)]
struct LtvReport {
    merchant_id: String,
    as_of: DateTime<Utc>,
    summary: LtvSummary,
    predictions: Vec<LtvPrediction>,
}

#[derive(Serialize)]
struct CohortReport {
    merchant_id: String,
    points: Vec<CohortPoint>,
    matrix: Vec<CohortRow>,
}

#[derive(Serialize)]
struct SegmentReport {
    merchant_id: String,
    window: AnalysisWindow,
    summary: Vec<SegmentSummary>,
    assignments: Vec<SegmentAssignment>,
}

#[derive(Serialize)]
struct ClusterReport {
    merchant_id: String,
    window: AnalysisWindow,
    #[serde(flatten)]
    result: ClusterResult,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retention_engine=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    let raw = std::fs::read_to_string(&cli.dataset)
        .with_context(|| format!("reading dataset {}", cli.dataset.display()))?;
    let dataset: MerchantDataset = serde_json::from_str(&raw)
        .with_context(|| format!("parsing dataset {}", cli.dataset.display()))?;

    let merchant_id = cli.merchant.clone().unwrap_or_else(|| dataset.merchant_id.clone());
    let latest_order = dataset.orders.iter().map(|o| o.created_at).max();

    let mut source = InMemoryDataSource::new(config.merchant.clone());
    source.insert(MerchantDataset {
        merchant_id: merchant_id.clone(),
        ..dataset
    });

    let mut settings = source.settings(&merchant_id)?;
    if let Some(days) = cli.churn_period_days {
        settings.churn_period_days = days;
    }
    let context = MerchantContext::new(merchant_id, settings)?;

    info!(
        merchant_id = %context.merchant_id,
        churn_period_days = context.settings.churn_period_days,
        currency = %context.settings.currency,
        "Dataset loaded"
    );

    let report = run(&cli.command, &config, &context, &source, latest_order)?;
    println!("{report}");
    Ok(())
}

fn run(
    command: &Command,
    config: &EngineConfig,
    context: &MerchantContext,
    source: &dyn RetentionDataSource,
    latest_order: Option<DateTime<Utc>>,
) -> anyhow::Result<String> {
    let merchant_id = context.merchant_id.as_str();
    let customers = source.fetch_customers(merchant_id)?;

    let json = match command {
        Command::Churn(args) => {
            let window = args.resolve(context, latest_order)?;
            let orders = source.fetch_orders(merchant_id, &window)?;
            let report = ChurnAnalyzer::new(config)
                .compute_churn_analytics(context, &customers, &orders, &window)?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Ltv { as_of } => {
            let as_of = as_of.or(latest_order).unwrap_or_else(Utc::now);
            let orders = all_orders(source, merchant_id, as_of)?;
            let predictions = compute_ltv_predictions(&customers, &orders, as_of)?;
            let summary = summarize_ltv(&predictions, &TrendBucketer::new(&config.trend));
            serde_json::to_string_pretty(&LtvReport {
                merchant_id: merchant_id.to_string(),
                as_of,
                summary,
                predictions,
            })?
        }
        Command::Cohorts { yearly } => {
            let orders = all_orders(source, merchant_id, DateTime::<Utc>::MAX_UTC)?;
            let points = compute_cohort_analysis(&orders, !yearly);
            let matrix = retention_matrix(&points);
            serde_json::to_string_pretty(&CohortReport {
                merchant_id: merchant_id.to_string(),
                points,
                matrix,
            })?
        }
        Command::Segments(args) => {
            let window = args.resolve(context, latest_order)?;
            let orders = source.fetch_orders(merchant_id, &window)?;
            let aggregates = WindowedAggregator::new(window).aggregate(&customers, &orders);
            let assignments = SegmentClassifier::new().segment_customers(&aggregates);
            serde_json::to_string_pretty(&SegmentReport {
                merchant_id: merchant_id.to_string(),
                window,
                summary: segment_summary(&aggregates, &assignments),
                assignments,
            })?
        }
        Command::Clusters(args) => {
            let window = args.resolve(context, latest_order)?;
            let orders = source.fetch_orders(merchant_id, &window)?;
            let aggregates = WindowedAggregator::new(window).aggregate(&customers, &orders);
            serde_json::to_string_pretty(&ClusterReport {
                merchant_id: merchant_id.to_string(),
                window,
                result: cluster_customers(&aggregates, &config.clustering),
            })?
        }
        Command::Products(args) => {
            let window = args.resolve(context, latest_order)?;
            let orders = source.fetch_orders(merchant_id, &window)?;
            serde_json::to_string_pretty(&ClusterReport {
                merchant_id: merchant_id.to_string(),
                window,
                result: cluster_products(&orders, &window, &config.clustering),
            })?
        }
    };

    Ok(json)
}

/// Every order up to `until`, regardless of age.
fn all_orders(
    source: &dyn RetentionDataSource,
    merchant_id: &str,
    until: DateTime<Utc>,
) -> anyhow::Result<Vec<Order>> {
    let window = AnalysisWindow::new(DateTime::<Utc>::MIN_UTC, until)?;
    Ok(source.fetch_orders(merchant_id, &window)?)
}

impl WindowArgs {
    fn resolve(
        &self,
        context: &MerchantContext,
        latest_order: Option<DateTime<Utc>>,
    ) -> anyhow::Result<AnalysisWindow> {
        let end = self.end.or(latest_order).unwrap_or_else(Utc::now);
        let window = match self.start {
            Some(start) => AnalysisWindow::new(start, end)?,
            None => {
                let days = self
                    .days
                    .unwrap_or(context.settings.churn_period_days as i64);
                AnalysisWindow::trailing_days(end, days)?
            }
        };
        Ok(window)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("expected RFC 3339 or YYYY-MM-DD, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use retention_core::types::MerchantSettings;

    fn context(churn_period_days: u32) -> MerchantContext {
        MerchantContext::new(
            "shop",
            MerchantSettings {
                churn_period_days,
                ..MerchantSettings::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        let date = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap());
        assert!(parse_timestamp("March 1st").is_err());
    }

    #[test]
    fn test_window_defaults_to_churn_period_before_latest_order() {
        let latest = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let args = WindowArgs {
            start: None,
            end: None,
            days: None,
        };
        let window = args.resolve(&context(60), Some(latest)).unwrap();
        assert_eq!(window.end, latest);
        assert_eq!(window.days(), 60);
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let args = WindowArgs {
            start: Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            days: None,
        };
        assert!(args.resolve(&context(90), None).is_err());
    }

    #[test]
    fn test_cli_parses_subcommand() {
        let cli = Cli::try_parse_from([
            "retention-engine",
            "--dataset",
            "shop.json",
            "churn",
            "--days",
            "120",
        ])
        .unwrap();
        match cli.command {
            Command::Churn(args) => assert_eq!(args.days, Some(120)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
