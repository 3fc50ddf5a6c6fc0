//! Pricing strategy entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::{PricingStrategy, StrategyRules, StrategyType};
use domain::stores::StoreError;
use sqlx::FromRow;

/// Database row of `pricing_strategies`.
#[derive(Debug, Clone, FromRow)]
pub struct PricingStrategyEntity {
    pub id: i64,
    pub name: String,
    pub strategy_type: String,
    pub rules: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl TryFrom<PricingStrategyEntity> for PricingStrategy {
    type Error = StoreError;

    fn try_from(entity: PricingStrategyEntity) -> Result<Self, Self::Error> {
        let strategy_type = entity
            .strategy_type
            .parse::<StrategyType>()
            .map_err(StoreError::Corrupt)?;
        let rules: StrategyRules = serde_json::from_value(entity.rules).map_err(|e| {
            StoreError::Corrupt(format!("pricing strategy {} rules: {}", entity.id, e))
        })?;

        Ok(PricingStrategy {
            id: entity.id,
            name: entity.name,
            strategy_type,
            rules,
            active: entity.active,
            created_at: entity.created_at,
            modified_at: entity.modified_at,
        })
    }
}
