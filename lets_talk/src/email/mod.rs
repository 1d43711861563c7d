//! Notification dispatcher for one-time codes.
//!
//! [`Mailer`] is the seam the auth flows send through. [`SmtpMailer`] wraps
//! the `lettre` async SMTP transport; [`LogMailer`] only logs and is used
//! when `SMTP_HOST` is not configured.

use async_trait::async_trait;
use log::info;

pub mod smtp;
pub mod templates;

pub use smtp::{EmailConfig, SmtpMailer};

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

/// A rendered message ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Sends rendered messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer that writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: OutgoingEmail) -> Result<(), MailError> {
        info!(
            "Email to {} (not sent, SMTP disabled): {} | {}",
            message.to, message.subject, message.text_body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");

        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = MailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let message = OutgoingEmail {
            to: "a@x.com".to_string(),
            subject: "hi".to_string(),
            text_body: "body".to_string(),
            html_body: "<p>body</p>".to_string(),
        };
        assert!(LogMailer.send(message).await.is_ok());
    }
}
