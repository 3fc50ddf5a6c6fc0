//! Rate limit log repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{AttemptOutcome, RateLimitKey};
use domain::stores::{RateLimitStore, StoreError};
use sqlx::PgPool;

use super::store_err;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct RateLimitRepository {
    pool: PgPool,
}

impl RateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Advisory lock name for one (ip, action) pair. The user id is left out so
/// user-scoped and IP-wide checks of the same action serialize together.
fn lock_key(key: &RateLimitKey) -> String {
    format!("rate_limit:{}:{}", key.ip_address, key.action.as_str())
}

#[async_trait]
impl RateLimitStore for RateLimitRepository {
    async fn record_attempt_if_below(
        &self,
        key: &RateLimitKey,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<AttemptOutcome, StoreError> {
        let timer = QueryTimer::new("record_rate_limit_attempt");
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Serialize count-and-insert per (ip, action).
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(lock_key(key))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        let attempts = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM rate_limit_log
            WHERE ip_address = $1
              AND action_type = $2
              AND last_attempt > $3
              AND ($4::BIGINT IS NULL OR portal_user_id = $4)
            "#,
        )
        .bind(&key.ip_address)
        .bind(key.action.as_str())
        .bind(window_start)
        .bind(key.portal_user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;
        let attempts = u32::try_from(attempts).unwrap_or(u32::MAX);

        if attempts >= max_attempts {
            tx.rollback().await.map_err(store_err)?;
            timer.record();
            return Ok(AttemptOutcome::Exceeded { attempts });
        }

        let attempt = attempts + 1;
        sqlx::query(
            r#"
            INSERT INTO rate_limit_log (ip_address, action_type, portal_user_id, attempt_count, first_attempt, last_attempt)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(&key.ip_address)
        .bind(key.action.as_str())
        .bind(key.portal_user_id)
        .bind(attempt as i32)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok(AttemptOutcome::Recorded { attempt })
    }
}
