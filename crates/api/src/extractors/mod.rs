//! Custom extractors.

pub mod admin_key;
pub mod client;

pub use admin_key::{AdminKey, ADMIN_KEY_HEADER};
pub use client::{client_ip, ClientContext, TrustedProxies};
