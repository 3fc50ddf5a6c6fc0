//! In-memory record store.
//!
//! Every trait operation runs under a single mutex, which gives the same
//! atomicity the PostgreSQL store gets from transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    PortalUserStore, PricingStrategyStore, RateLimitStore, SecurityEventStore, StoreError,
    VerificationTokenStore,
};
use crate::models::rate_limit::RateLimitRecord;
use crate::models::security_event::SecurityEvent;
use crate::models::{
    AttemptOutcome, NewPricingStrategy, NewSecurityEvent, NewVerificationToken, PortalUser,
    PricingStrategy, RateLimitKey, TokenType, VerificationToken,
};

#[derive(Debug, Default)]
struct Tables {
    strategies: Vec<PricingStrategy>,
    tokens: Vec<VerificationToken>,
    rate_limits: Vec<RateLimitRecord>,
    events: Vec<SecurityEvent>,
    users: Vec<PortalUser>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_active_strategy(
        &mut self,
        strategy: &NewPricingStrategy,
        now: DateTime<Utc>,
    ) -> PricingStrategy {
        let row = PricingStrategy {
            id: self.next_id(),
            name: strategy.name.clone(),
            strategy_type: strategy.strategy_type,
            rules: strategy.rules.clone(),
            active: true,
            created_at: now,
            modified_at: now,
        };
        self.strategies.push(row.clone());
        row
    }
}

/// Store backed by process memory. Implements every record store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail, simulating a lost database.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".to_string()))
    }

    /// Returns the stored token row for a hash, regardless of type.
    pub fn token_by_hash(&self, token_hash: &str) -> Option<VerificationToken> {
        let tables = self.tables.lock().ok()?;
        tables
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned()
    }

    pub fn tokens(&self) -> Vec<VerificationToken> {
        self.tables
            .lock()
            .map(|t| t.tokens.clone())
            .unwrap_or_default()
    }

    /// Overwrites a token's expiry. Used to age tokens in tests.
    pub fn set_token_expiry(&self, token_hash: &str, expires_at: DateTime<Utc>) -> bool {
        let Ok(mut tables) = self.tables.lock() else {
            return false;
        };
        match tables.tokens.iter_mut().find(|t| t.token_hash == token_hash) {
            Some(token) => {
                token.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Flags a portal user inactive. Used to model closed accounts in tests.
    pub fn deactivate_user(&self, portal_user_id: i64) -> bool {
        let Ok(mut tables) = self.tables.lock() else {
            return false;
        };
        match tables.users.iter_mut().find(|u| u.id == portal_user_id) {
            Some(user) => {
                user.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn active_strategy_count(&self) -> usize {
        self.tables
            .lock()
            .map(|t| t.strategies.iter().filter(|s| s.active).count())
            .unwrap_or(0)
    }

    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.tables
            .lock()
            .map(|t| t.events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PricingStrategyStore for InMemoryStore {
    async fn get_or_create_active(
        &self,
        default: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError> {
        let mut tables = self.tables()?;
        if let Some(active) = tables.strategies.iter().rev().find(|s| s.active) {
            return Ok(active.clone());
        }
        Ok(tables.insert_active_strategy(default, Utc::now()))
    }

    async fn replace_active(
        &self,
        strategy: &NewPricingStrategy,
    ) -> Result<PricingStrategy, StoreError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        for existing in tables.strategies.iter_mut().filter(|s| s.active) {
            existing.active = false;
            existing.modified_at = now;
        }
        Ok(tables.insert_active_strategy(strategy, now))
    }
}

#[async_trait]
impl VerificationTokenStore for InMemoryStore {
    async fn insert(&self, token: &NewVerificationToken) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables.tokens.iter().any(|t| t.token_hash == token.token_hash) {
            return Err(StoreError::Conflict(
                "verification token already exists".to_string(),
            ));
        }
        tables.tokens.push(VerificationToken {
            token_hash: token.token_hash.clone(),
            portal_user_id: token.portal_user_id,
            token_type: token.token_type,
            expires_at: token.expires_at,
            created_at: token.created_at,
            used_at: None,
            is_used: false,
        });
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let mut tables = self.tables()?;
        let token = tables.tokens.iter_mut().find(|t| {
            t.token_hash == token_hash && t.token_type == token_type && t.is_usable_at(now)
        });
        Ok(token.map(|t| {
            t.is_used = true;
            t.used_at = Some(now);
            t.portal_user_id
        }))
    }

    async fn find(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash && t.token_type == token_type)
            .cloned())
    }

    async fn mark_used(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.tokens.iter_mut().find(|t| t.token_hash == token_hash) {
            Some(token) => {
                token.is_used = true;
                token.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn record_attempt_if_below(
        &self,
        key: &RateLimitKey,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<AttemptOutcome, StoreError> {
        let mut tables = self.tables()?;
        let attempts = tables
            .rate_limits
            .iter()
            .filter(|r| {
                r.ip_address == key.ip_address
                    && r.action_type == key.action
                    && r.last_attempt > window_start
                    && key
                        .portal_user_id
                        .map_or(true, |user| r.portal_user_id == Some(user))
            })
            .count() as u32;

        if attempts >= max_attempts {
            return Ok(AttemptOutcome::Exceeded { attempts });
        }

        let id = tables.next_id();
        let attempt = attempts + 1;
        tables.rate_limits.push(RateLimitRecord {
            id,
            ip_address: key.ip_address.clone(),
            action_type: key.action,
            portal_user_id: key.portal_user_id,
            attempt_count: attempt as i32,
            first_attempt: now,
            last_attempt: now,
        });
        Ok(AttemptOutcome::Recorded { attempt })
    }
}

#[async_trait]
impl SecurityEventStore for InMemoryStore {
    async fn append(&self, event: &NewSecurityEvent, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        tables.events.push(SecurityEvent {
            id,
            portal_user_id: event.portal_user_id,
            event_type: event.event_type,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            details: event.details.clone(),
            event_time: at,
        });
        Ok(())
    }

    async fn count_from_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<i64, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.ip_address == ip && e.event_time > since)
            .count() as i64)
    }

    async fn count_failures_for_user_since(
        &self,
        portal_user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .events
            .iter()
            .filter(|e| {
                e.portal_user_id == Some(portal_user_id)
                    && e.event_type.is_failure()
                    && e.event_time > since
            })
            .count() as i64)
    }
}

#[async_trait]
impl PortalUserStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<PortalUser>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<PortalUser>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.is_active && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PortalUser, StoreError> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(StoreError::Conflict(
                "portal user email already exists".to_string(),
            ));
        }
        let user = PortalUser {
            id: tables.next_id(),
            email: email.to_string(),
            email_verified: false,
            password_hash: password_hash.map(str::to_string),
            is_active: true,
            created_at: now,
            modified_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn set_email_verified(&self, id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.email_verified = true;
                user.modified_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.modified_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, SecurityEventType};
    use chrono::Duration;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemoryStore::new();
        let default = NewPricingStrategy::default_fixed_price();

        let first = store.get_or_create_active(&default).await.unwrap();
        let second = store.get_or_create_active(&default).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.active_strategy_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_active_keeps_one_active() {
        let store = InMemoryStore::new();
        let default = NewPricingStrategy::default_fixed_price();
        let first = store.get_or_create_active(&default).await.unwrap();
        let replaced = store.replace_active(&default).await.unwrap();

        assert_ne!(first.id, replaced.id);
        assert!(replaced.active);
        assert_eq!(store.active_strategy_count(), 1);

        let current = store.get_or_create_active(&default).await.unwrap();
        assert_eq!(current.id, replaced.id);
    }

    #[tokio::test]
    async fn test_consume_only_once() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .insert(&NewVerificationToken {
                token_hash: "h".to_string(),
                portal_user_id: 5,
                token_type: TokenType::PasswordReset,
                expires_at: now + Duration::hours(1),
                created_at: now,
            })
            .await
            .unwrap();

        assert_eq!(
            store.consume("h", TokenType::EmailVerification, now).await.unwrap(),
            None
        );
        assert_eq!(
            store.consume("h", TokenType::PasswordReset, now).await.unwrap(),
            Some(5)
        );
        assert_eq!(
            store.consume("h", TokenType::PasswordReset, now).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_rate_limit_scoped_by_user() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let window_start = now - Duration::hours(1);
        let key = |user| RateLimitKey {
            ip_address: "1.1.1.1".to_string(),
            action: ActionType::LoginAttempt,
            portal_user_id: user,
        };

        store
            .record_attempt_if_below(&key(Some(1)), window_start, now, 1)
            .await
            .unwrap();
        let other_user = store
            .record_attempt_if_below(&key(Some(2)), window_start, now, 1)
            .await
            .unwrap();
        assert_eq!(other_user, AttemptOutcome::Recorded { attempt: 1 });

        let anyone = store
            .record_attempt_if_below(&key(None), window_start, now, 2)
            .await
            .unwrap();
        assert_eq!(anyone, AttemptOutcome::Exceeded { attempts: 2 });
    }

    #[tokio::test]
    async fn test_failure_count_ignores_other_events() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for event_type in [
            SecurityEventType::LoginFailed,
            SecurityEventType::VerifyFailed,
            SecurityEventType::LoginSuccess,
        ] {
            store
                .append(&NewSecurityEvent::new(event_type, Some(1), "ip", "ua"), now)
                .await
                .unwrap();
        }
        let count = store
            .count_failures_for_user_since(1, now - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(store.find_by_id(1).await.is_err());
        store.set_unavailable(false);
        assert!(store.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = InMemoryStore::new();
        store
            .create("jane@example.com", None, Utc::now())
            .await
            .unwrap();
        let err = store
            .create("JANE@example.com", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
