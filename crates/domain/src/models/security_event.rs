//! Security event log (session log) domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// More than this many events from one IP inside [`RAPID_REQUEST_WINDOW_SECS`] is suspicious.
pub const RAPID_REQUEST_THRESHOLD: i64 = 10;
pub const RAPID_REQUEST_WINDOW_SECS: i64 = 5;

/// More than this many failures for one user inside [`FAILED_ATTEMPT_WINDOW_MINS`] is suspicious.
pub const FAILED_ATTEMPT_THRESHOLD: i64 = 5;
pub const FAILED_ATTEMPT_WINDOW_MINS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    LoginSuccess,
    LoginFailed,
    VerifyFailed,
    EmailVerified,
    VerificationSent,
    ResetRequested,
    PasswordReset,
    RateLimited,
    RegistrationSuccess,
}

impl SecurityEventType {
    pub const ALL: [SecurityEventType; 9] = [
        SecurityEventType::LoginSuccess,
        SecurityEventType::LoginFailed,
        SecurityEventType::VerifyFailed,
        SecurityEventType::EmailVerified,
        SecurityEventType::VerificationSent,
        SecurityEventType::ResetRequested,
        SecurityEventType::PasswordReset,
        SecurityEventType::RateLimited,
        SecurityEventType::RegistrationSuccess,
    ];

    /// Event types counted by the failed-attempt heuristic.
    pub const FAILURES: [SecurityEventType; 2] =
        [SecurityEventType::LoginFailed, SecurityEventType::VerifyFailed];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::LoginSuccess => "LOGIN_SUCCESS",
            SecurityEventType::LoginFailed => "LOGIN_FAILED",
            SecurityEventType::VerifyFailed => "VERIFY_FAILED",
            SecurityEventType::EmailVerified => "EMAIL_VERIFIED",
            SecurityEventType::VerificationSent => "VERIFICATION_SENT",
            SecurityEventType::ResetRequested => "RESET_REQUESTED",
            SecurityEventType::PasswordReset => "PASSWORD_RESET",
            SecurityEventType::RateLimited => "RATE_LIMITED",
            SecurityEventType::RegistrationSuccess => "REGISTRATION_SUCCESS",
        }
    }

    pub fn is_failure(&self) -> bool {
        Self::FAILURES.contains(self)
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityEventType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("Unknown security event type: {}", s))
    }
}

/// A stored security event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecurityEvent {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_user_id: Option<i64>,
    pub event_type: SecurityEventType,
    pub ip_address: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub event_time: DateTime<Utc>,
}

/// Event data to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurityEvent {
    pub portal_user_id: Option<i64>,
    pub event_type: SecurityEventType,
    pub ip_address: String,
    pub user_agent: String,
    pub details: Option<String>,
}

impl NewSecurityEvent {
    pub fn new(
        event_type: SecurityEventType,
        portal_user_id: Option<i64>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            portal_user_id,
            event_type,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Reasons the abuse heuristics can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionReason {
    RapidRequests,
    MultipleFailedAttempts,
}

impl SuspicionReason {
    pub fn message(&self) -> &'static str {
        match self {
            SuspicionReason::RapidRequests => "Rapid requests detected",
            SuspicionReason::MultipleFailedAttempts => "Multiple failed attempts",
        }
    }
}

/// `(is_suspicious, reason)` produced by the abuse heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SuspicionReport {
    pub is_suspicious: bool,
    pub reason: String,
}

impl SuspicionReport {
    pub fn from_reasons(reasons: &[SuspicionReason]) -> Self {
        if reasons.is_empty() {
            return Self {
                is_suspicious: false,
                reason: "No suspicious activity".to_string(),
            };
        }

        let reason = reasons
            .iter()
            .map(SuspicionReason::message)
            .collect::<Vec<_>>()
            .join(" | ");
        Self {
            is_suspicious: true,
            reason,
        }
    }

    /// Fail-closed report used when the event log cannot be read.
    pub fn check_failed() -> Self {
        Self {
            is_suspicious: true,
            reason: "Error performing security check".to_string(),
        }
    }
}

pub fn rapid_request_window() -> Duration {
    Duration::seconds(RAPID_REQUEST_WINDOW_SECS)
}

pub fn failed_attempt_window() -> Duration {
    Duration::minutes(FAILED_ATTEMPT_WINDOW_MINS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        for event in SecurityEventType::ALL {
            assert_eq!(event.as_str().parse::<SecurityEventType>().unwrap(), event);
        }
        assert!("LOGOUT".parse::<SecurityEventType>().is_err());
    }

    #[test]
    fn test_failure_types() {
        assert!(SecurityEventType::LoginFailed.is_failure());
        assert!(SecurityEventType::VerifyFailed.is_failure());
        assert!(!SecurityEventType::RateLimited.is_failure());
    }

    #[test]
    fn test_report_without_reasons() {
        let report = SuspicionReport::from_reasons(&[]);
        assert!(!report.is_suspicious);
        assert_eq!(report.reason, "No suspicious activity");
    }

    #[test]
    fn test_report_joins_reasons() {
        let report = SuspicionReport::from_reasons(&[
            SuspicionReason::RapidRequests,
            SuspicionReason::MultipleFailedAttempts,
        ]);
        assert!(report.is_suspicious);
        assert_eq!(
            report.reason,
            "Rapid requests detected | Multiple failed attempts"
        );
    }

    #[test]
    fn test_new_event_with_details() {
        let event = NewSecurityEvent::new(SecurityEventType::VerifyFailed, Some(3), "1.2.3.4", "ua")
            .with_details("Invalid token");
        assert_eq!(event.details.as_deref(), Some("Invalid token"));
        assert_eq!(event.portal_user_id, Some(3));
    }
}
