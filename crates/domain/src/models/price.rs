//! Price calculation inputs and results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A raw numeric value as submitted by a form: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Coerces the value to a decimal, or `None` when it is not a finite number.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            RawAmount::Number(n) if n.is_finite() => Decimal::from_str(&n.to_string()).ok(),
            RawAmount::Number(_) => None,
            RawAmount::Text(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
        }
    }
}

impl Default for RawAmount {
    fn default() -> Self {
        RawAmount::Number(0.0)
    }
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// One employee labor line on a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LaborDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub hours: Option<RawAmount>,
    #[serde(default)]
    pub rate: Option<RawAmount>,
}

impl LaborDetail {
    pub fn new(hours: impl Into<RawAmount>, rate: impl Into<RawAmount>) -> Self {
        Self {
            hours: Some(hours.into()),
            rate: Some(rate.into()),
            ..Default::default()
        }
    }

    /// `hours * rate`, or `None` when either is missing or non-numeric.
    pub fn cost(&self) -> Option<Decimal> {
        let hours = self.hours.as_ref()?.to_decimal()?;
        let rate = self.rate.as_ref()?.to_decimal()?;
        hours.checked_mul(rate)
    }
}

/// Itemized figures of one price calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PriceBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub labor_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub material_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub adjustment_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_before_adjustment: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_total: Decimal,
}

/// Final chargeable price together with its breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PriceQuote {
    #[serde(with = "rust_decimal::serde::float")]
    pub final_total: Decimal,
    pub breakdown: PriceBreakdown,
}

/// Price calculation request from the transaction form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PriceRequest {
    pub base_cost: RawAmount,
    #[serde(default)]
    pub labor_details: Vec<LaborDetail>,
    #[serde(default)]
    pub material_cost: RawAmount,
    #[serde(default)]
    pub price_adjustment: RawAmount,
}

/// Errors returned by the price calculation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("{field} must be a number")]
    NonNumeric { field: &'static str },

    #[error("Price overflow while computing {step}")]
    Overflow { step: &'static str },
}
