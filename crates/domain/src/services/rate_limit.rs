//! Sliding-window rate limiting for sensitive portal actions.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{ActionType, AttemptOutcome, RateLimitDecision, RateLimitKey};
use crate::stores::RateLimitStore;

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Checks the limit for `action_type` and records the attempt when allowed.
    ///
    /// With `portal_user_id` set, only that user's attempts from the IP count.
    pub async fn check_rate_limit(
        &self,
        ip_address: &str,
        action_type: &str,
        portal_user_id: Option<i64>,
    ) -> RateLimitDecision {
        self.check_rate_limit_at(ip_address, action_type, portal_user_id, Utc::now())
            .await
    }

    pub async fn check_rate_limit_at(
        &self,
        ip_address: &str,
        action_type: &str,
        portal_user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let Ok(action) = action_type.parse::<ActionType>() else {
            warn!(action_type = %action_type, "Rate limit requested for unknown action");
            return RateLimitDecision::deny("Invalid action type");
        };

        self.check_action_at(ip_address, action, portal_user_id, now)
            .await
    }

    /// Typed variant of [`Self::check_rate_limit`].
    pub async fn check_action(
        &self,
        ip_address: &str,
        action: ActionType,
        portal_user_id: Option<i64>,
    ) -> RateLimitDecision {
        self.check_action_at(ip_address, action, portal_user_id, Utc::now())
            .await
    }

    pub async fn check_action_at(
        &self,
        ip_address: &str,
        action: ActionType,
        portal_user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let limit = action.limit();
        let key = RateLimitKey {
            ip_address: ip_address.to_string(),
            action,
            portal_user_id,
        };

        match self
            .store
            .record_attempt_if_below(&key, limit.window_start(now), now, limit.max_attempts)
            .await
        {
            Ok(AttemptOutcome::Recorded { attempt }) => {
                info!(
                    ip_address = %ip_address,
                    action = %action,
                    attempt = attempt,
                    max_attempts = limit.max_attempts,
                    "Rate limit check passed"
                );
                RateLimitDecision::allow("Rate limit check passed")
            }
            Ok(AttemptOutcome::Exceeded { attempts }) => {
                warn!(
                    ip_address = %ip_address,
                    action = %action,
                    attempts = attempts,
                    "Rate limit exceeded"
                );
                RateLimitDecision::deny(format!("Rate limit exceeded for {}", action))
            }
            Err(e) => {
                error!(
                    ip_address = %ip_address,
                    action = %action,
                    error = %e,
                    "Failed to check rate limit"
                );
                RateLimitDecision::deny("Error checking rate limit")
            }
        }
    }
}
