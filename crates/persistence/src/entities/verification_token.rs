//! Verification token entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::{TokenType, VerificationToken};
use domain::stores::StoreError;
use sqlx::FromRow;

/// Database row of `verification_tokens`.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationTokenEntity {
    pub token_hash: String,
    pub portal_user_id: i64,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub is_used: bool,
}

impl TryFrom<VerificationTokenEntity> for VerificationToken {
    type Error = StoreError;

    fn try_from(entity: VerificationTokenEntity) -> Result<Self, Self::Error> {
        Ok(VerificationToken {
            token_type: entity
                .token_type
                .parse::<TokenType>()
                .map_err(StoreError::Corrupt)?,
            token_hash: entity.token_hash,
            portal_user_id: entity.portal_user_id,
            expires_at: entity.expires_at,
            created_at: entity.created_at,
            used_at: entity.used_at,
            is_used: entity.is_used,
        })
    }
}
