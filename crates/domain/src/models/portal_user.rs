//! Customer portal account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer portal user. The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PortalUser {
    pub id: i64,
    pub email: String,
    pub email_verified: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl PortalUser {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}
