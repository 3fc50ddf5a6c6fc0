//! Domain layer for the EZ Biz operations backend.
//!
//! This crate contains:
//! - Domain models (pricing strategy, price breakdown, tokens, rate limits)
//! - Record store traits and an in-memory store
//! - Pricing, verification, rate limit and security services

pub mod models;
pub mod services;
pub mod stores;
