//! Customer portal user entity for database operations.

use chrono::{DateTime, Utc};
use domain::models::PortalUser;
use sqlx::FromRow;

/// Database row of `customer_portal_users`.
#[derive(Debug, Clone, FromRow)]
pub struct PortalUserEntity {
    pub id: i64,
    pub email: String,
    pub email_verified: bool,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<PortalUserEntity> for PortalUser {
    fn from(entity: PortalUserEntity) -> Self {
        PortalUser {
            id: entity.id,
            email: entity.email,
            email_verified: entity.email_verified,
            password_hash: entity.password_hash,
            is_active: entity.is_active,
            created_at: entity.created_at,
            modified_at: entity.modified_at,
        }
    }
}
