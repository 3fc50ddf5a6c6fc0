//! Verification token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{NewVerificationToken, TokenType, VerificationToken};
use domain::stores::{StoreError, VerificationTokenStore};
use sqlx::PgPool;

use super::store_err;
use crate::entities::VerificationTokenEntity;
use crate::metrics::QueryTimer;

const COLUMNS: &str =
    "token_hash, portal_user_id, token_type, expires_at, created_at, used_at, is_used";

#[derive(Clone)]
pub struct VerificationTokenRepository {
    pool: PgPool,
}

impl VerificationTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationTokenStore for VerificationTokenRepository {
    async fn insert(&self, token: &NewVerificationToken) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_verification_token");
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (token_hash, portal_user_id, token_type, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.portal_user_id)
        .bind(token.token_type.as_str())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let timer = QueryTimer::new("consume_verification_token");
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE verification_tokens
            SET is_used = TRUE, used_at = $3
            WHERE token_hash = $1
              AND token_type = $2
              AND is_used = FALSE
              AND expires_at > $3
            RETURNING portal_user_id
            "#,
        )
        .bind(token_hash)
        .bind(token_type.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(user_id)
    }

    async fn find(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let timer = QueryTimer::new("find_verification_token");
        let entity = sqlx::query_as::<_, VerificationTokenEntity>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM verification_tokens
            WHERE token_hash = $1 AND token_type = $2
            "#
        ))
        .bind(token_hash)
        .bind(token_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();

        entity.map(TryInto::try_into).transpose()
    }

    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("mark_verification_token_used");
        let result = sqlx::query(
            r#"
            UPDATE verification_tokens
            SET is_used = TRUE, used_at = COALESCE(used_at, $2)
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        timer.record();
        Ok(result.rows_affected() > 0)
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
            vec![
                "token_hash",
                "portal_user_id",
                "token_type",
                "expires_at",
                "created_at",
                "used_at",
                "is_used"
            ]
        );
    }
}
