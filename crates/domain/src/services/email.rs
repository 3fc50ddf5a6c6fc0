//! Outbound email collaborator and the portal account mailer.
//!
//! Delivery is behind [`EmailSender`]; this module only decides what to send.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};

use super::verification::VerificationService;
use crate::models::TokenType;

pub const VERIFY_URL_PLACEHOLDER: &str = "{VERIFY_URL}";
pub const RESET_URL_PLACEHOLDER: &str = "{RESET_URL}";

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email";
pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset Request";

/// Errors that can occur while handing off an email.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Sender that keeps messages in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MockEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    pub simulate_failure: bool,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.simulate_failure {
            return Err(EmailError::SendFailed("Simulated failure".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| EmailError::SendFailed("mailbox lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// Links and templates used by [`AccountMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerSettings {
    pub base_url: String,
    pub verification_template: String,
    pub reset_template: String,
}

impl MailerSettings {
    pub fn verify_url(&self, token: &str) -> String {
        format!("{}/verify?token={}", self.base_url.trim_end_matches('/'), token)
    }

    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/?reset_token={}", self.base_url.trim_end_matches('/'), token)
    }
}

/// Mints action tokens and mails the links to portal users.
pub struct AccountMailer {
    verification: Arc<VerificationService>,
    sender: Arc<dyn EmailSender>,
    settings: MailerSettings,
}

impl AccountMailer {
    pub fn new(
        verification: Arc<VerificationService>,
        sender: Arc<dyn EmailSender>,
        settings: MailerSettings,
    ) -> Self {
        Self {
            verification,
            sender,
            settings,
        }
    }

    /// Sends the email verification link. Returns false when no token could
    /// be minted or the sender failed.
    pub async fn send_verification_email(&self, email: &str, portal_user_id: i64) -> bool {
        let Some(token) = self
            .verification
            .generate_verification_token(portal_user_id, TokenType::EmailVerification)
            .await
        else {
            return false;
        };

        let body_text = self
            .settings
            .verification_template
            .replace(VERIFY_URL_PLACEHOLDER, &self.settings.verify_url(&token));
        self.deliver(email, VERIFICATION_SUBJECT, body_text, portal_user_id)
            .await
    }

    /// Sends the password reset link.
    pub async fn send_password_reset_email(&self, email: &str, portal_user_id: i64) -> bool {
        let Some(token) = self
            .verification
            .generate_verification_token(portal_user_id, TokenType::PasswordReset)
            .await
        else {
            return false;
        };

        let body_text = self
            .settings
            .reset_template
            .replace(RESET_URL_PLACEHOLDER, &self.settings.reset_url(&token));
        if !self
            .deliver(email, PASSWORD_RESET_SUBJECT, body_text, portal_user_id)
            .await
        {
            // The link never reached the user.
            if !self.verification.mark_token_used(&token).await {
                warn!(
                    portal_user_id = portal_user_id,
                    "Undelivered password reset token could not be invalidated"
                );
            }
            return false;
        }
        true
    }

    async fn deliver(
        &self,
        to: &str,
        subject: &str,
        body_text: String,
        portal_user_id: i64,
    ) -> bool {
        let message = EmailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body_text,
        };

        match self.sender.send(message).await {
            Ok(()) => {
                info!(portal_user_id = portal_user_id, subject = %subject, "Account email sent");
                true
            }
            Err(EmailError::InvalidAddress(address)) => {
                warn!(portal_user_id = portal_user_id, address = %address, "Rejected recipient address");
                false
            }
            Err(e) => {
                error!(portal_user_id = portal_user_id, subject = %subject, error = %e, "Failed to send account email");
                false
            }
        }
    }
}
