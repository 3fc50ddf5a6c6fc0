//! Single-use, time-bounded action tokens.
//!
//! Tokens are handed to the user in clear text and stored as SHA-256 hashes.
//! Verification consumes the token in one conditional update, so a token can
//! be redeemed at most once even under concurrent requests.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::models::verification_token::{calculate_expiry, DEFAULT_TOKEN_TTL_HOURS};
use crate::models::{NewVerificationToken, TokenRejection, TokenType, VerificationResult};
use crate::stores::{PortalUserStore, StoreError, VerificationTokenStore};
use shared::crypto::{generate_url_safe_token, sha256_hex};

/// Lifetimes of minted tokens, per token type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub email_verification_hours: i64,
    pub password_reset_hours: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            email_verification_hours: DEFAULT_TOKEN_TTL_HOURS,
            password_reset_hours: 1,
        }
    }
}

impl TokenLifetimes {
    pub fn hours_for(&self, token_type: TokenType) -> i64 {
        match token_type {
            TokenType::EmailVerification => self.email_verification_hours,
            TokenType::PasswordReset => self.password_reset_hours,
        }
    }
}

pub struct VerificationService {
    tokens: Arc<dyn VerificationTokenStore>,
    users: Arc<dyn PortalUserStore>,
    lifetimes: TokenLifetimes,
}

impl VerificationService {
    pub fn new(
        tokens: Arc<dyn VerificationTokenStore>,
        users: Arc<dyn PortalUserStore>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            tokens,
            users,
            lifetimes,
        }
    }

    /// Mints a token for the user. Returns `None` when it could not be stored.
    pub async fn generate_verification_token(
        &self,
        portal_user_id: i64,
        token_type: TokenType,
    ) -> Option<String> {
        self.generate_verification_token_at(portal_user_id, token_type, Utc::now())
            .await
    }

    pub async fn generate_verification_token_at(
        &self,
        portal_user_id: i64,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let token = generate_url_safe_token();
        let record = NewVerificationToken {
            token_hash: sha256_hex(&token),
            portal_user_id,
            token_type,
            expires_at: calculate_expiry(now, self.lifetimes.hours_for(token_type)),
            created_at: now,
        };

        match self.tokens.insert(&record).await {
            Ok(()) => {
                info!(
                    portal_user_id = portal_user_id,
                    token_type = %token_type,
                    expires_at = %record.expires_at,
                    "Verification token issued"
                );
                Some(token)
            }
            Err(e) => {
                error!(
                    portal_user_id = portal_user_id,
                    token_type = %token_type,
                    error = %e,
                    "Failed to store verification token"
                );
                None
            }
        }
    }

    /// Redeems a token. On success the token is marked used and the owning
    /// user id is returned.
    pub async fn verify_token(
        &self,
        token: &str,
        token_type: TokenType,
    ) -> Result<i64, TokenRejection> {
        self.verify_token_at(token, token_type, Utc::now()).await
    }

    pub async fn verify_token_at(
        &self,
        token: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<i64, TokenRejection> {
        let token_hash = sha256_hex(token);

        let outcome = match self.tokens.consume(&token_hash, token_type, now).await {
            Ok(Some(portal_user_id)) => Ok(Ok(portal_user_id)),
            Ok(None) => self.classify_rejection(&token_hash, token_type, now).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Ok(portal_user_id)) => {
                info!(
                    portal_user_id = portal_user_id,
                    token_type = %token_type,
                    "Verification token redeemed"
                );
                Ok(portal_user_id)
            }
            Ok(Err(rejection)) => {
                debug!(token_type = %token_type, reason = %rejection, "Verification token rejected");
                Err(rejection)
            }
            Err(e) => {
                error!(token_type = %token_type, error = %e, "Token verification failed");
                Err(TokenRejection::Unavailable)
            }
        }
    }

    /// Explains why `consume` refused a token.
    async fn classify_rejection(
        &self,
        token_hash: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Result<i64, TokenRejection>, StoreError> {
        let Some(token) = self.tokens.find(token_hash, token_type).await? else {
            debug!(token_type = %token_type, "Unknown verification token");
            return Ok(Err(TokenRejection::Invalid));
        };

        if token.is_expired_at(now) {
            debug!(portal_user_id = token.portal_user_id, "Verification token expired");
            return Ok(Err(TokenRejection::Expired));
        }

        if token_type == TokenType::EmailVerification {
            let verified = self
                .users
                .find_by_id(token.portal_user_id)
                .await?
                .map(|u| u.email_verified)
                .unwrap_or(false);
            if verified {
                return Ok(Err(TokenRejection::EmailAlreadyVerified));
            }
        }

        warn!(portal_user_id = token.portal_user_id, "Verification token reused");
        Ok(Err(TokenRejection::AlreadyUsed))
    }

    /// Owner of a token of this type, whatever its state. Lets callers
    /// attribute failed redemptions. `None` for unknown tokens or store errors.
    pub async fn token_owner(&self, token: &str, token_type: TokenType) -> Option<i64> {
        match self.tokens.find(&sha256_hex(token), token_type).await {
            Ok(found) => found.map(|t| t.portal_user_id),
            Err(e) => {
                error!(token_type = %token_type, error = %e, "Failed to look up token owner");
                None
            }
        }
    }

    /// Flattened form of [`Self::verify_token`].
    pub async fn verify(&self, token: &str, token_type: TokenType) -> VerificationResult {
        self.verify_token(token, token_type).await.into()
    }

    /// Marks a token used regardless of its state. Idempotent.
    pub async fn mark_token_used(&self, token: &str) -> bool {
        match self.tokens.mark_used(&sha256_hex(token), Utc::now()).await {
            Ok(found) => {
                if !found {
                    debug!("mark_token_used matched no token");
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to mark token used");
                false
            }
        }
    }

    pub async fn mark_email_verified(&self, portal_user_id: i64) -> bool {
        match self.users.set_email_verified(portal_user_id, Utc::now()).await {
            Ok(true) => {
                info!(portal_user_id = portal_user_id, "Email marked verified");
                true
            }
            Ok(false) => {
                warn!(portal_user_id = portal_user_id, "No portal user to mark verified");
                false
            }
            Err(e) => {
                error!(portal_user_id = portal_user_id, error = %e, "Failed to mark email verified");
                false
            }
        }
    }
}
