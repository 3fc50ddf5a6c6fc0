//! Verification token domain model for email verification and password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default lifetime of an action token.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// The action a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::EmailVerification => "EMAIL_VERIFICATION",
            TokenType::PasswordReset => "PASSWORD_RESET",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL_VERIFICATION" => Ok(TokenType::EmailVerification),
            "PASSWORD_RESET" => Ok(TokenType::PasswordReset),
            other => Err(format!("Unknown token type: {}", other)),
        }
    }
}

/// A stored action token. Only the SHA-256 hash of the token value is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerificationToken {
    pub token_hash: String,
    pub portal_user_id: i64,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    pub is_used: bool,
}

impl VerificationToken {
    /// Expiry is computed at check time; `now == expires_at` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A token is usable iff it is unused and unexpired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && !self.is_expired_at(now)
    }
}

/// Token data to persist when a token is minted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVerificationToken {
    pub token_hash: String,
    pub portal_user_id: i64,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Calculate expiry from an issue time and a lifetime in hours.
pub fn calculate_expiry(issued_at: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
    issued_at + Duration::hours(ttl_hours)
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Email already verified")]
    EmailAlreadyVerified,

    #[error("Token has already been used")]
    AlreadyUsed,

    #[error("Error verifying token")]
    Unavailable,
}

/// Flattened verification outcome: `(valid, user_id, message)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub message: String,
}

impl From<Result<i64, TokenRejection>> for VerificationResult {
    fn from(result: Result<i64, TokenRejection>) -> Self {
        match result {
            Ok(user_id) => Self {
                valid: true,
                user_id: Some(user_id),
                message: "Token valid".to_string(),
            },
            Err(rejection) => Self {
                valid: false,
                user_id: None,
                message: rejection.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: Duration, is_used: bool) -> VerificationToken {
        let now = Utc::now();
        VerificationToken {
            token_hash: "hash".to_string(),
            portal_user_id: 7,
            token_type: TokenType::EmailVerification,
            expires_at: now + expires_in,
            created_at: now,
            used_at: None,
            is_used,
        }
    }

    #[test]
    fn test_token_type_round_trip() {
        for t in [TokenType::EmailVerification, TokenType::PasswordReset] {
            assert_eq!(t.as_str().parse::<TokenType>().unwrap(), t);
        }
        assert!("API_KEY".parse::<TokenType>().is_err());
    }

    #[test]
    fn test_token_type_serde() {
        assert_eq!(
            serde_json::to_string(&TokenType::PasswordReset).unwrap(),
            "\"PASSWORD_RESET\""
        );
    }

    #[test]
    fn test_is_usable() {
        let now = Utc::now();
        assert!(token(Duration::hours(1), false).is_usable_at(now));
        assert!(!token(Duration::hours(1), true).is_usable_at(now));
        assert!(!token(Duration::hours(-1), false).is_usable_at(now));
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        let t = token(Duration::hours(1), false);
        assert!(t.is_expired_at(t.expires_at));
        assert!(!t.is_expired_at(t.expires_at - Duration::seconds(1)));
    }

    #[test]
    fn test_calculate_expiry() {
        let issued = Utc::now();
        assert_eq!(
            calculate_expiry(issued, DEFAULT_TOKEN_TTL_HOURS),
            issued + Duration::hours(24)
        );
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(TokenRejection::Invalid.to_string(), "Invalid token");
        assert_eq!(TokenRejection::Expired.to_string(), "Token has expired");
        assert_eq!(
            TokenRejection::EmailAlreadyVerified.to_string(),
            "Email already verified"
        );
        assert_eq!(
            TokenRejection::AlreadyUsed.to_string(),
            "Token has already been used"
        );
    }

    #[test]
    fn test_verification_result_from_outcome() {
        let ok = VerificationResult::from(Ok(42));
        assert!(ok.valid);
        assert_eq!(ok.user_id, Some(42));

        let rejected = VerificationResult::from(Err(TokenRejection::Expired));
        assert!(!rejected.valid);
        assert_eq!(rejected.user_id, None);
        assert_eq!(rejected.message, "Token has expired");
    }
}
