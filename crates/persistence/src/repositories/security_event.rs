//! Security event (session log) repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{NewSecurityEvent, SecurityEventType};
use domain::stores::{SecurityEventStore, StoreError};
use sqlx::PgPool;

use super::store_err;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct SecurityEventRepository {
    pool: PgPool,
}

impl SecurityEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `event_type` values counted by the failed-attempt heuristic.
fn failure_event_types() -> Vec<&'static str> {
    SecurityEventType::FAILURES
        .iter()
        .map(SecurityEventType::as_str)
        .collect()
}

#[async_trait]
impl SecurityEventStore for SecurityEventRepository {
    async fn append(&self, event: &NewSecurityEvent, at: DateTime<Utc>) -> Result<(), StoreError> {
        let timer = QueryTimer::new("append_security_event");
        sqlx::query(
            r#"
            INSERT INTO session_log (portal_user_id, event_type, ip_address, user_agent, details, event_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.portal_user_id)
        .bind(event.event_type.as_str())
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.details)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(())
    }

    async fn count_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<i64, StoreError> {
        let timer = QueryTimer::new("count_security_events_from_ip");
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM session_log
            WHERE ip_address = $1 AND event_time > $2
            "#,
        )
        .bind(ip)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(count)
    }

    async fn count_failures_for_user_since(
        &self,
        portal_user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let timer = QueryTimer::new("count_failed_security_events_for_user");
        let failures = failure_event_types();

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM session_log
            WHERE portal_user_id = $1
              AND event_type = ANY($2)
              AND event_time > $3
            "#,
        )
        .bind(portal_user_id)
        .bind(&failures)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(count)
    }
}
