//! Pricing engine: active strategy management and final price calculation.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::models::{
    LaborDetail, NewPricingStrategy, PriceBreakdown, PriceQuote, PriceRequest, PricingError,
    PricingStrategy, RawAmount, SaveStrategyRequest, StrategyType,
};
use crate::stores::PricingStrategyStore;
use shared::money::round_to_cents;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn coerce(value: &RawAmount, field: &'static str) -> Result<Decimal, PricingError> {
    value.to_decimal().ok_or(PricingError::NonNumeric { field })
}

fn add(a: Decimal, b: Decimal, step: &'static str) -> Result<Decimal, PricingError> {
    a.checked_add(b).ok_or(PricingError::Overflow { step })
}

/// Sum of `hours * rate` over all lines, or zero when any line is missing
/// or non-numeric.
fn labor_total(labor_details: &[LaborDetail]) -> Result<Decimal, PricingError> {
    let mut total = Decimal::ZERO;
    for line in labor_details {
        match line.cost() {
            Some(cost) => total = add(total, cost, "labor")?,
            None => {
                warn!(
                    employee_id = ?line.employee_id,
                    "Labor line is missing or non-numeric, labor cost set to zero"
                );
                return Ok(Decimal::ZERO);
            }
        }
    }
    Ok(total)
}

/// Computes the final price for a service.
///
/// Order is labor, then materials, then the percentage adjustment. Without a
/// strategy the total is base plus material and the adjustment is ignored.
pub fn calculate_final_price(
    base_cost: &RawAmount,
    strategy: Option<&PricingStrategy>,
    labor_details: &[LaborDetail],
    material_cost: &RawAmount,
    price_adjustment: &RawAmount,
) -> Result<PriceQuote, PricingError> {
    let base_cost = coerce(base_cost, "base_cost")?;
    let material_cost = coerce(material_cost, "material_cost")?;
    let adjustment_pct = coerce(price_adjustment, "price_adjustment")?;

    let mut breakdown = PriceBreakdown {
        base_cost,
        material_cost,
        ..Default::default()
    };

    let Some(strategy) = strategy else {
        let total = add(base_cost, material_cost, "materials")?;
        breakdown.total_before_adjustment = total;
        breakdown.final_total = total;
        return Ok(PriceQuote {
            final_total: total,
            breakdown,
        });
    };

    let mut total = base_cost;
    if strategy.strategy_type == StrategyType::CostPlusLabor {
        breakdown.labor_cost = labor_total(labor_details)?;
        total = add(total, breakdown.labor_cost, "labor")?;
    }

    if strategy.rules.include_materials() {
        total = add(total, material_cost, "materials")?;
    }
    breakdown.total_before_adjustment = total;

    if !adjustment_pct.is_zero() {
        let amount = total
            .checked_mul(adjustment_pct)
            .and_then(|v| v.checked_div(HUNDRED))
            .ok_or(PricingError::Overflow { step: "adjustment" })?;
        breakdown.adjustment_amount = round_to_cents(amount);
        total = add(total, breakdown.adjustment_amount, "adjustment")?;
    }
    breakdown.final_total = total;

    Ok(PriceQuote {
        final_total: total,
        breakdown,
    })
}

/// Service around the active pricing strategy.
pub struct PricingService {
    store: Arc<dyn PricingStrategyStore>,
}

impl PricingService {
    pub fn new(store: Arc<dyn PricingStrategyStore>) -> Self {
        Self { store }
    }

    /// Returns the active strategy, provisioning the default fixed-price
    /// strategy when none exists. Store failures yield `None`.
    pub async fn get_active_strategy(&self) -> Option<PricingStrategy> {
        match self
            .store
            .get_or_create_active(&NewPricingStrategy::default_fixed_price())
            .await
        {
            Ok(strategy) => {
                debug!(strategy_id = strategy.id, strategy_type = %strategy.strategy_type, "Active pricing strategy loaded");
                Some(strategy)
            }
            Err(e) => {
                error!(error = %e, "Failed to load active pricing strategy");
                None
            }
        }
    }

    /// Replaces the active strategy. Returns false on validation or store failure.
    pub async fn save_strategy(&self, request: &SaveStrategyRequest) -> bool {
        if let Err(e) = request.validate() {
            warn!(error = %e, "Rejected invalid pricing strategy");
            return false;
        }

        match self.store.replace_active(&request.into()).await {
            Ok(strategy) => {
                info!(
                    strategy_id = strategy.id,
                    strategy_type = %strategy.strategy_type,
                    include_materials = strategy.rules.include_materials(),
                    "Pricing strategy saved"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save pricing strategy");
                false
            }
        }
    }

    /// Prices a request against the active strategy. Also returns the
    /// strategy type, `None` when fallback pricing applied.
    pub async fn quote(
        &self,
        request: &PriceRequest,
    ) -> Result<(PriceQuote, Option<StrategyType>), PricingError> {
        let strategy = self.get_active_strategy().await;
        let quote = calculate_final_price(
            &request.base_cost,
            strategy.as_ref(),
            &request.labor_details,
            &request.material_cost,
            &request.price_adjustment,
        )?;
        Ok((quote, strategy.map(|s| s.strategy_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyRules;
    use crate::stores::InMemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn strategy(strategy_type: StrategyType, include_materials: Option<bool>) -> PricingStrategy {
        PricingStrategy {
            id: 1,
            name: "test".to_string(),
            strategy_type,
            rules: StrategyRules {
                include_materials,
                ..Default::default()
            },
            active: true,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn amount(v: f64) -> RawAmount {
        RawAmount::from(v)
    }

    #[test]
    fn test_no_strategy_ignores_adjustment() {
        let quote =
            calculate_final_price(&amount(100.0), None, &[], &amount(25.0), &amount(10.0)).unwrap();
        assert_eq!(quote.final_total, dec!(125));
        assert_eq!(quote.breakdown.adjustment_amount, Decimal::ZERO);
        assert_eq!(quote.breakdown.labor_cost, Decimal::ZERO);
    }

    #[test]
    fn test_fixed_price_excludes_materials_when_disabled() {
        let s = strategy(StrategyType::FixedPrice, Some(false));
        let quote =
            calculate_final_price(&amount(100.0), Some(&s), &[], &amount(25.0), &amount(0.0))
                .unwrap();
        assert_eq!(quote.final_total, dec!(100));
        assert_eq!(quote.breakdown.material_cost, dec!(25));
    }

    #[test]
    fn test_fixed_price_includes_materials_by_default() {
        let s = strategy(StrategyType::FixedPrice, None);
        let quote =
            calculate_final_price(&amount(100.0), Some(&s), &[], &amount(25.0), &amount(0.0))
                .unwrap();
        assert_eq!(quote.final_total, dec!(125));
    }

    #[test]
    fn test_fixed_price_ignores_labor() {
        let s = strategy(StrategyType::FixedPrice, Some(false));
        let labor = [LaborDetail::new(2.0, 50.0)];
        let quote =
            calculate_final_price(&amount(80.0), Some(&s), &labor, &amount(0.0), &amount(0.0))
                .unwrap();
        assert_eq!(quote.breakdown.labor_cost, Decimal::ZERO);
        assert_eq!(quote.final_total, dec!(80));
    }

    #[test]
    fn test_cost_plus_labor_sums_lines() {
        let s = strategy(StrategyType::CostPlusLabor, Some(true));
        let labor = [LaborDetail::new(2.0, 50.0), LaborDetail::new(1.0, 30.0)];
        let quote =
            calculate_final_price(&amount(100.0), Some(&s), &labor, &amount(20.0), &amount(0.0))
                .unwrap();
        assert_eq!(quote.breakdown.labor_cost, dec!(130));
        assert_eq!(quote.breakdown.total_before_adjustment, dec!(250));
        assert_eq!(quote.final_total, dec!(250));
    }

    #[test]
    fn test_malformed_labor_line_zeroes_labor() {
        let s = strategy(StrategyType::CostPlusLabor, Some(false));
        let labor = [LaborDetail::new(2.0, 50.0), LaborDetail::new("x", 30.0)];
        let quote =
            calculate_final_price(&amount(100.0), Some(&s), &labor, &amount(0.0), &amount(0.0))
                .unwrap();
        assert_eq!(quote.breakdown.labor_cost, Decimal::ZERO);
        assert_eq!(quote.final_total, dec!(100));
    }

    #[test]
    fn test_negative_adjustment() {
        let s = strategy(StrategyType::FixedPrice, Some(false));
        let quote =
            calculate_final_price(&amount(200.0), Some(&s), &[], &amount(0.0), &amount(-10.0))
                .unwrap();
        assert_eq!(quote.breakdown.adjustment_amount, dec!(-20));
        assert_eq!(quote.final_total, dec!(180));
    }

    #[test]
    fn test_zero_adjustment_is_exactly_zero() {
        let s = strategy(StrategyType::FixedPrice, Some(true));
        let quote =
            calculate_final_price(&amount(99.99), Some(&s), &[], &amount(0.01), &amount(0.0))
                .unwrap();
        assert_eq!(quote.breakdown.adjustment_amount, Decimal::ZERO);
        assert_eq!(quote.final_total, dec!(100.00));
    }

    #[test]
    fn test_adjustment_rounds_to_cents() {
        let s = strategy(StrategyType::FixedPrice, Some(false));
        let quote =
            calculate_final_price(&amount(10.05), Some(&s), &[], &amount(0.0), &amount(5.0))
                .unwrap();
        // 10.05 * 5% = 0.5025
        assert_eq!(quote.breakdown.adjustment_amount, dec!(0.50));
        assert_eq!(quote.final_total, dec!(10.55));
    }

    #[test]
    fn test_non_numeric_base_is_an_error() {
        let result = calculate_final_price(
            &RawAmount::from("abc"),
            None,
            &[],
            &amount(0.0),
            &amount(0.0),
        );
        assert_eq!(
            result,
            Err(PricingError::NonNumeric { field: "base_cost" })
        );
    }

    #[test]
    fn test_string_inputs_are_coerced() {
        let s = strategy(StrategyType::CostPlusLabor, None);
        let labor = [LaborDetail::new("1.5", "40")];
        let quote = calculate_final_price(
            &RawAmount::from("50"),
            Some(&s),
            &labor,
            &RawAmount::from("10.50"),
            &RawAmount::from("0"),
        )
        .unwrap();
        assert_eq!(quote.final_total, dec!(120.50));
    }

    #[tokio::test]
    async fn test_get_active_strategy_provisions_default() {
        let service = PricingService::new(Arc::new(InMemoryStore::new()));
        let strategy = service.get_active_strategy().await.unwrap();
        assert_eq!(strategy.strategy_type, StrategyType::FixedPrice);
        assert!(!strategy.rules.include_materials());
        assert!(strategy.rules.description.is_some());
    }

    #[tokio::test]
    async fn test_get_active_strategy_store_failure_is_none() {
        let store = Arc::new(InMemoryStore::new());
        store.set_unavailable(true);
        let service = PricingService::new(store);
        assert!(service.get_active_strategy().await.is_none());
    }

    #[tokio::test]
    async fn test_save_strategy_leaves_one_active() {
        let store = Arc::new(InMemoryStore::new());
        let service = PricingService::new(store.clone());
        service.get_active_strategy().await.unwrap();

        let request = SaveStrategyRequest {
            name: None,
            strategy_type: StrategyType::CostPlusLabor,
            include_materials: true,
        };
        assert!(service.save_strategy(&request).await);
        assert!(service.save_strategy(&request).await);

        assert_eq!(store.active_strategy_count(), 1);
        let active = service.get_active_strategy().await.unwrap();
        assert_eq!(active.strategy_type, StrategyType::CostPlusLabor);
    }

    #[tokio::test]
    async fn test_save_strategy_failure_returns_false() {
        let store = Arc::new(InMemoryStore::new());
        let service = PricingService::new(store.clone());
        store.set_unavailable(true);

        let request = SaveStrategyRequest {
            name: Some("Labor".to_string()),
            strategy_type: StrategyType::CostPlusLabor,
            include_materials: true,
        };
        assert!(!service.save_strategy(&request).await);
    }

    #[tokio::test]
    async fn test_save_strategy_rejects_invalid_name() {
        let service = PricingService::new(Arc::new(InMemoryStore::new()));
        let request = SaveStrategyRequest {
            name: Some(String::new()),
            strategy_type: StrategyType::FixedPrice,
            include_materials: true,
        };
        assert!(!service.save_strategy(&request).await);
    }

    #[tokio::test]
    async fn test_quote_uses_active_strategy() {
        let service = PricingService::new(Arc::new(InMemoryStore::new()));
        let request = PriceRequest {
            base_cost: amount(100.0),
            material_cost: amount(40.0),
            ..Default::default()
        };
        // Default strategy excludes materials.
        let (quote, strategy_type) = service.quote(&request).await.unwrap();
        assert_eq!(quote.final_total, dec!(100));
        assert_eq!(strategy_type, Some(StrategyType::FixedPrice));
    }
}
