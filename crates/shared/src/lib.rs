//! Shared utilities and common types for the EZ Biz backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Action token generation and hashing
//! - Password hashing with Argon2id
//! - Form field validation
//! - Currency rounding and formatting

pub mod crypto;
pub mod money;
pub mod password;
pub mod validation;
