//! Admin key authentication extractor.
//!
//! Guards the back-office writes (pricing strategy) behind the key
//! configured in `security.admin_api_key`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use shared::crypto::sha256_hex;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

const REJECTED: &str = "Invalid or missing admin key";

/// Proof that the request carried the configured admin key.
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

impl AdminKey {
    /// Compares digests so the comparison length never depends on the input.
    pub fn validate(configured: &str, presented: Option<&str>) -> Result<Self, ApiError> {
        if configured.is_empty() {
            tracing::warn!("Admin write rejected: no admin key configured");
            return Err(ApiError::Unauthorized(REJECTED.to_string()));
        }

        let presented = presented
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(REJECTED.to_string()))?;

        if sha256_hex(presented) != sha256_hex(configured) {
            tracing::warn!("Admin write rejected: key mismatch");
            return Err(ApiError::Unauthorized(REJECTED.to_string()));
        }

        Ok(AdminKey)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        Self::validate(&state.config.security.admin_api_key, presented)
    }
}
