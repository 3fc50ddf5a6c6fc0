//! Pricing strategy repository.

use async_trait::async_trait;
use domain::models::{NewPricingStrategy, PricingStrategy};
use domain::stores::{PricingStrategyStore, StoreError};
use sqlx::{PgPool, Postgres, Transaction};

use super::store_err;
use crate::entities::PricingStrategyEntity;
use crate::metrics::QueryTimer;

/// Advisory lock key serializing writers of the active strategy.
const ACTIVE_STRATEGY_LOCK: i64 = 0x7072_6963_696e_67;

const COLUMNS: &str = "id, name, strategy_type, rules, active, created_at, modified_at";

/// Latest modified active row wins if more than one is ever active.
fn select_active_sql() -> String {
    format!(
        r#"
        SELECT {COLUMNS}
        FROM pricing_strategies
        WHERE active = TRUE
        ORDER BY modified_at DESC, id DESC
        LIMIT 1
        "#
    )
}

#[derive(Clone)]
pub struct PricingStrategyRepository {
    pool: PgPool,
}

impl PricingStrategyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_active(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ACTIVE_STRATEGY_LOCK)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_active(
        tx: &mut Transaction<'_, Postgres>,
        strategy: &NewPricingStrategy,
    ) -> Result<PricingStrategyEntity, StoreError> {
        let rules = serde_json::to_value(&strategy.rules)
            .map_err(|e| StoreError::Corrupt(format!("pricing rules: {}", e)))?;

        sqlx::query_as::<_, PricingStrategyEntity>(&format!(
            r#"
            INSERT INTO pricing_strategies (name, strategy_type, rules, active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&strategy.name)
        .bind(strategy.strategy_type.as_str())
        .bind(rules)
        .fetch_one(&mut **tx)
        .await
        .map_err(store_err)
    }
}

#[async_trait]
impl PricingStrategyStore for PricingStrategyRepository {
    async fn get_or_create_active(
        &self,
        default: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError> {
        let timer = QueryTimer::new("get_or_create_active_strategy");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        Self::lock_active(&mut tx).await.map_err(store_err)?;

        let existing = sqlx::query_as::<_, PricingStrategyEntity>(&select_active_sql())
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let entity = match existing {
            Some(entity) => entity,
            None => {
                tracing::info!("No active pricing strategy, provisioning default");
                Self::insert_active(&mut tx, default).await?
            }
        };

        tx.commit().await.map_err(store_err)?;
        timer.record();
        entity.try_into()
    }

    async fn replace_active(
        &self,
        strategy: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError> {
        let timer = QueryTimer::new("replace_active_strategy");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        Self::lock_active(&mut tx).await.map_err(store_err)?;

        sqlx::query(
            r#"
            UPDATE pricing_strategies
            SET active = FALSE, modified_at = NOW()
            WHERE active = TRUE
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        let entity = Self::insert_active(&mut tx, strategy).await?;

        tx.commit().await.map_err(store_err)?;
        timer.record();
        entity.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_match_entity_fields() {
        let columns: Vec<&str> = COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(
            columns,
            vec!["id", "name", "strategy_type", "rules", "active", "created_at", "modified_at"]
        );
    }

    #[test]
    fn test_active_lookup_prefers_latest_modification() {
        let sql = select_active_sql();
        assert!(sql.contains("WHERE active = TRUE"));
        assert!(sql.contains("ORDER BY modified_at DESC, id DESC"));
        assert!(!sql.contains("created_at DESC"));
    }

    #[test]
    fn test_strategy_lock_key_outside_hashtext_range() {
        // hashtext() yields an int4, so per-action rate limit keys never reach this value.
        assert!(ACTIVE_STRATEGY_LOCK > i64::from(i32::MAX));
        assert_eq!(ACTIVE_STRATEGY_LOCK.to_be_bytes()[1..], *b"pricing");
    }
}
