//! Persistence layer for the EZ Biz operations backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - PostgreSQL implementations of the domain record store traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

pub use repositories::{
    PortalUserRepository, PricingStrategyRepository, RateLimitRepository,
    SecurityEventRepository, VerificationTokenRepository,
};
