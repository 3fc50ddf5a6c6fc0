//! Database entity definitions (row mappings).

pub mod portal_user;
pub mod pricing_strategy;
pub mod verification_token;

pub use portal_user::PortalUserEntity;
pub use pricing_strategy::PricingStrategyEntity;
pub use verification_token::VerificationTokenEntity;
