//! Domain services for the EZ Biz operations backend.
//!
//! Services hold the business rules and talk to persistence only through
//! the record store traits.

pub mod email;
pub mod pricing;
pub mod rate_limit;
pub mod security;
pub mod verification;

pub use email::{AccountMailer, EmailError, EmailMessage, EmailSender, MailerSettings, MockEmailSender};
pub use pricing::{calculate_final_price, PricingService};
pub use rate_limit::RateLimiter;
pub use security::SecurityMonitor;
pub use verification::{TokenLifetimes, VerificationService};
