//! Data-access boundary: the engine never queries storage itself; callers
//! hand it records fetched through a `RetentionDataSource`.
//!
//! Every call carries the merchant id explicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{RetentionError, RetentionResult};
use crate::types::{AnalysisWindow, Customer, MerchantSettings, Order};

/// Supplier of raw merchant records. Implementations wrap a database,
/// an API client, or a file export.
pub trait RetentionDataSource: Send + Sync {
    /// Orders created inside `window`. Orders may lack a customer.
    fn fetch_orders(&self, merchant_id: &str, window: &AnalysisWindow)
        -> RetentionResult<Vec<Order>>;

    /// Every customer known for the merchant.
    fn fetch_customers(&self, merchant_id: &str) -> RetentionResult<Vec<Customer>>;

    /// Analysis settings for the merchant.
    fn settings(&self, merchant_id: &str) -> RetentionResult<MerchantSettings>;
}

/// A merchant's full export: settings plus raw customers and orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantDataset {
    pub merchant_id: String,
    #[serde(default)]
    pub settings: Option<MerchantSettings>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// In-memory source keyed by merchant id, used for file exports and tests.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    datasets: BTreeMap<String, MerchantDataset>,
    fallback_settings: MerchantSettings,
}

impl InMemoryDataSource {
    pub fn new(fallback_settings: MerchantSettings) -> Self {
        Self {
            datasets: BTreeMap::new(),
            fallback_settings,
        }
    }

    pub fn insert(&mut self, dataset: MerchantDataset) {
        self.datasets.insert(dataset.merchant_id.clone(), dataset);
    }

    fn dataset(&self, merchant_id: &str) -> RetentionResult<&MerchantDataset> {
        self.datasets
            .get(merchant_id)
            .ok_or_else(|| RetentionError::DataSource(format!("unknown merchant '{merchant_id}'")))
    }
}

impl RetentionDataSource for InMemoryDataSource {
    fn fetch_orders(
        &self,
        merchant_id: &str,
        window: &AnalysisWindow,
    ) -> RetentionResult<Vec<Order>> {
        Ok(self
            .dataset(merchant_id)?
            .orders
            .iter()
            .filter(|o| window.contains(&o.created_at))
            .cloned()
            .collect())
    }

    fn fetch_customers(&self, merchant_id: &str) -> RetentionResult<Vec<Customer>> {
        Ok(self.dataset(merchant_id)?.customers.clone())
    }

    fn settings(&self, merchant_id: &str) -> RetentionResult<MerchantSettings> {
        let dataset = self.dataset(merchant_id)?;
        let settings = dataset
            .settings
            .clone()
            .unwrap_or_else(|| self.fallback_settings.clone());
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dataset() -> MerchantDataset {
        let order = |id: &str, day: u32| Order {
            id: id.to_string(),
            customer_id: Some("c1".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            total_price: 10.0,
            line_items: vec![],
        };
        MerchantDataset {
            merchant_id: "shop-1".to_string(),
            settings: None,
            customers: vec![],
            orders: vec![order("o1", 5), order("o2", 20)],
        }
    }

    #[test]
    fn test_fetch_orders_filters_window() {
        let mut source = InMemoryDataSource::new(MerchantSettings::default());
        source.insert(dataset());

        let window = AnalysisWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let orders = source.fetch_orders("shop-1", &window).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "o2");
    }

    #[test]
    fn test_unknown_merchant() {
        let source = InMemoryDataSource::new(MerchantSettings::default());
        assert!(matches!(
            source.fetch_customers("nope"),
            Err(RetentionError::DataSource(_))
        ));
    }

    #[test]
    fn test_settings_fall_back_and_validate() {
        let mut source = InMemoryDataSource::new(MerchantSettings::default());
        source.insert(dataset());
        assert_eq!(source.settings("shop-1").unwrap().churn_period_days, 90);

        let mut bad = dataset();
        bad.merchant_id = "shop-2".to_string();
        bad.settings = Some(MerchantSettings {
            churn_period_days: 5,
            currency: "EUR".to_string(),
        });
        source.insert(bad);
        assert!(source.settings("shop-2").is_err());
    }
}
