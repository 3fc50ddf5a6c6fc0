//! Customer portal user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::PortalUser;
use domain::stores::{PortalUserStore, StoreError};
use sqlx::PgPool;

use super::store_err;
use crate::entities::PortalUserEntity;
use crate::metrics::QueryTimer;

const COLUMNS: &str = "id, email, email_verified, password_hash, is_active, created_at, modified_at";

#[derive(Clone)]
pub struct PortalUserRepository {
    pool: PgPool,
}

impl PortalUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortalUserStore for PortalUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<PortalUser>, StoreError> {
        let timer = QueryTimer::new("find_portal_user_by_id");
        let entity = sqlx::query_as::<_, PortalUserEntity>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM customer_portal_users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(entity.map(Into::into))
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<PortalUser>, StoreError> {
        let timer = QueryTimer::new("find_portal_user_by_email");
        let entity = sqlx::query_as::<_, PortalUserEntity>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM customer_portal_users
            WHERE LOWER(email) = LOWER($1) AND is_active = TRUE
            "#
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(entity.map(Into::into))
    }

    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PortalUser, StoreError> {
        let timer = QueryTimer::new("create_portal_user");
        let entity = sqlx::query_as::<_, PortalUserEntity>(&format!(
            r#"
            INSERT INTO customer_portal_users (email, password_hash, created_at, modified_at)
            VALUES ($1, $2, $3, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(entity.into())
    }

    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("set_portal_user_email_verified");
        let result = sqlx::query(
            r#"
            UPDATE customer_portal_users
            SET email_verified = TRUE, modified_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("set_portal_user_password");
        let result = sqlx::query(
            r#"
            UPDATE customer_portal_users
            SET password_hash = $2, modified_at = $3
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
