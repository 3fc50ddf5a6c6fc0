//! Email delivery for account messages.
//!
//! Only the `console` provider is shipped: it writes messages to the log,
//! which is how links reach developers running the portal locally.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::EmailConfig;
use domain::services::{EmailError, EmailMessage, EmailSender};
use shared::validation::validate_email;

/// [`EmailSender`] backed by the `email` config section.
#[derive(Debug, Clone)]
pub struct ConsoleEmailSender {
    config: EmailConfig,
}

impl ConsoleEmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn send_console(&self, message: &EmailMessage) {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        debug!(body_text = %message.body_text, "Email body");
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        if validate_email(&message.to).is_err() {
            return Err(EmailError::InvalidAddress(message.to));
        }

        match self.config.provider.as_str() {
            "console" => {
                self.send_console(&message);
                Ok(())
            }
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }
}
