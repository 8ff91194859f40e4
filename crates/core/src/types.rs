//! Input records, analysis windows and merchant settings shared by every
//! analytics component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RetentionError, RetentionResult};

/// Smallest churn period a merchant may configure, in days.
pub const MIN_CHURN_PERIOD_DAYS: u32 = 30;
/// Largest churn period a merchant may configure, in days.
pub const MAX_CHURN_PERIOD_DAYS: u32 = 365;

// ─── Input Records ──────────────────────────────────────────────────────────

/// A single product line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    pub quantity: u32,
    /// Unit price in the merchant's currency.
    pub price: f64,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// An order as supplied by the data-access layer. Immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Guest checkouts carry no customer and are excluded from per-customer analysis.
    #[serde(default)]
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_price: f64,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A merchant's customer record. Immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Display name built from whichever name parts are present.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ─── Analysis Window ────────────────────────────────────────────────────────

/// Inclusive date window an analysis runs over. The window end is the
/// reference instant for every "days since" measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> RetentionResult<Self> {
        if end < start {
            return Err(RetentionError::InvalidInput(format!(
                "window end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering the `days` days that end at `end`.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> RetentionResult<Self> {
        if days < 0 {
            return Err(RetentionError::InvalidInput(format!(
                "trailing window length must be non-negative, got {days}"
            )));
        }
        let start = chrono::Duration::try_days(days)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                RetentionError::InvalidInput(format!(
                    "trailing window of {days} days before {} is out of range",
                    end.to_rfc3339()
                ))
            })?;
        Self::new(start, end)
    }

    /// Whole days spanned by the window.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

// ─── Merchant Settings ──────────────────────────────────────────────────────

/// Per-merchant analysis settings supplied by the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantSettings {
    #[serde(default = "default_churn_period_days")]
    pub churn_period_days: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_churn_period_days() -> u32 {
    90
}
fn default_currency() -> String {
    "USD".to_string()
}

impl Default for MerchantSettings {
    fn default() -> Self {
        Self {
            churn_period_days: default_churn_period_days(),
            currency: default_currency(),
        }
    }
}

impl MerchantSettings {
    pub fn validate(&self) -> RetentionResult<()> {
        if !(MIN_CHURN_PERIOD_DAYS..=MAX_CHURN_PERIOD_DAYS).contains(&self.churn_period_days) {
            return Err(RetentionError::InvalidInput(format!(
                "churn period must be within [{MIN_CHURN_PERIOD_DAYS}, {MAX_CHURN_PERIOD_DAYS}] days, got {}",
                self.churn_period_days
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(RetentionError::InvalidInput(
                "currency must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merchant identity plus settings, threaded explicitly through every
/// analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantContext {
    pub merchant_id: String,
    pub settings: MerchantSettings,
}

impl MerchantContext {
    pub fn new(merchant_id: impl Into<String>, settings: MerchantSettings) -> RetentionResult<Self> {
        let merchant_id = merchant_id.into();
        if merchant_id.trim().is_empty() {
            return Err(RetentionError::InvalidInput(
                "merchant id must not be empty".to_string(),
            ));
        }
        settings.validate()?;
        Ok(Self {
            merchant_id,
            settings,
        })
    }
}

/// Division that yields 0 instead of NaN or infinity.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
