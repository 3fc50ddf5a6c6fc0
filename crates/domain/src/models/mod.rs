//! Domain models for the EZ Biz operations backend.

pub mod customer;
pub mod portal_user;
pub mod price;
pub mod pricing_strategy;
pub mod rate_limit;
pub mod security_event;
pub mod session;
pub mod verification_token;

pub use customer::{BusinessForm, CustomerForm};
pub use portal_user::PortalUser;
pub use price::{LaborDetail, PriceBreakdown, PriceQuote, PriceRequest, PricingError, RawAmount};
pub use pricing_strategy::{
    NewPricingStrategy, PricingStrategy, SaveStrategyRequest, StrategyRules, StrategyType,
};
pub use rate_limit::{ActionType, AttemptOutcome, RateLimitDecision, RateLimitKey};
pub use security_event::{NewSecurityEvent, SecurityEventType, SuspicionReport};
pub use session::SessionContext;
pub use verification_token::{
    NewVerificationToken, TokenRejection, TokenType, VerificationResult, VerificationToken,
};
