//! Record store traits.
//!
//! Services only talk to persistence through these traits. The PostgreSQL
//! implementation lives in the `persistence` crate; [`memory::InMemoryStore`]
//! backs tests and local development.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AttemptOutcome, NewPricingStrategy, NewSecurityEvent, NewVerificationToken, PortalUser,
    PricingStrategy, RateLimitKey, TokenType, VerificationToken,
};

pub use memory::InMemoryStore;

/// Errors raised by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait PricingStrategyStore: Send + Sync {
    /// Returns the active strategy, inserting `default` as active when none
    /// exists. Concurrent callers observe the same row.
    async fn get_or_create_active(
        &self,
        default: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError>;

    /// Deactivates every strategy and inserts `strategy` as the only active one.
    async fn replace_active(
        &self,
        strategy: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError>;
}

#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    async fn insert(&self, token: &NewVerificationToken) -> Result<(), StoreError>;

    /// Marks the token used iff it matches the type, is unused and `now <
    /// expires_at`. Returns the owning user id on success.
    async fn consume(
        &self,
        token_hash: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError>;

    async fn find(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<VerificationToken>, StoreError>;

    /// Unconditionally marks the token used. Returns false when no row matched.
    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Counts attempts for `key` with `last_attempt > window_start` and, when
    /// the count is below `max_attempts`, records a new attempt. Both steps
    /// happen atomically per (ip, action).
    async fn record_attempt_if_below(
        &self,
        key: &RateLimitKey,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<AttemptOutcome, StoreError>;
}

#[async_trait]
pub trait SecurityEventStore: Send + Sync {
    async fn append(&self, event: &NewSecurityEvent, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Events of any type from `ip` with `event_time > since`.
    async fn count_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<i64, StoreError>;

    /// `LOGIN_FAILED` and `VERIFY_FAILED` events for the user with `event_time > since`.
    async fn count_failures_for_user_since(
        &self,
        portal_user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait PortalUserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<PortalUser>, StoreError>;

    async fn find_active_by_email(&self, email: &str) -> Result<Option<PortalUser>, StoreError>;

    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PortalUser, StoreError>;

    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
