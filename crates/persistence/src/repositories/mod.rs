//! Repository implementations of the domain record store traits.

pub mod portal_user;
pub mod pricing_strategy;
pub mod rate_limit;
pub mod security_event;
pub mod verification_token;

pub use portal_user::PortalUserRepository;
pub use pricing_strategy::PricingStrategyRepository;
pub use rate_limit::RateLimitRepository;
pub use security_event::SecurityEventRepository;
pub use verification_token::VerificationTokenRepository;

use domain::stores::StoreError;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Converts a driver error into the domain store error.
pub(crate) fn store_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Database(e.to_string())
}
