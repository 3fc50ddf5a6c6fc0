//! HTTP route handlers.

pub mod auth;
pub mod health;
pub mod portal;
pub mod pricing;
pub mod validation;
