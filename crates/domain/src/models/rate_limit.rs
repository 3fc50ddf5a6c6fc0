//! Rate limit domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sensitive actions gated by a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    LoginAttempt,
    ResetRequest,
    Registration,
    BookingAttempt,
    VerificationRequest,
}

/// Ceiling and trailing window for one action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_attempts: u32,
    pub window_minutes: i64,
}

impl RateLimit {
    pub fn window(&self) -> Duration {
        Duration::minutes(self.window_minutes)
    }

    /// Attempts strictly after this instant count against the limit.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::LoginAttempt,
        ActionType::ResetRequest,
        ActionType::Registration,
        ActionType::BookingAttempt,
        ActionType::VerificationRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::LoginAttempt => "LOGIN_ATTEMPT",
            ActionType::ResetRequest => "RESET_REQUEST",
            ActionType::Registration => "REGISTRATION",
            ActionType::BookingAttempt => "BOOKING_ATTEMPT",
            ActionType::VerificationRequest => "VERIFICATION_REQUEST",
        }
    }

    /// Fixed limits per action: login 5/h, reset 3/h, registration 3/h,
    /// booking 10/h, verification resend 3/h.
    pub fn limit(&self) -> RateLimit {
        let max_attempts = match self {
            ActionType::LoginAttempt => 5,
            ActionType::ResetRequest => 3,
            ActionType::Registration => 3,
            ActionType::BookingAttempt => 10,
            ActionType::VerificationRequest => 3,
        };
        RateLimit {
            max_attempts,
            window_minutes: 60,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown action type: {}", s))
    }
}

/// Identity an attempt is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub ip_address: String,
    pub action: ActionType,
    /// When set, only attempts by this user are counted.
    pub portal_user_id: Option<i64>,
}

/// Result of the store's atomic count-and-record step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt was recorded; `attempt` is its ordinal inside the window.
    Recorded { attempt: u32 },
    /// The ceiling was already reached; nothing was recorded.
    Exceeded { attempts: u32 },
}

/// A single logged attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitRecord {
    pub id: i64,
    pub ip_address: String,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_user_id: Option<i64>,
    pub attempt_count: i32,
    pub first_attempt: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
}

/// `(allowed, message)` returned to the action handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub message: String,
}

impl RateLimitDecision {
    pub fn allow(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
        }
    }
}
