//! Email transports.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};

use crate::error::{NotificationError, NotificationResult};

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> NotificationResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    /// Implicit TLS port.
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: None,
            password: None,
            from_name: "MedAI Hospital".to_string(),
        }
    }
}

/// Sends through an SMTP relay over implicit TLS, authenticating as the
/// configured user. The sender address is the SMTP username.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// `NotificationError::Config` when credentials are missing or the relay
    /// cannot be set up.
    pub fn new(settings: &SmtpSettings) -> NotificationResult<Self> {
        let (Some(username), Some(password)) = (
            settings.username.as_deref().filter(|u| !u.is_empty()),
            settings.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(NotificationError::config("SMTP credentials not configured"));
        };

        let from = format!("{} <{}>", settings.from_name, username)
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(format!("from: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| NotificationError::config(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self { transport, from })
    }

    pub fn from_mailbox(&self) -> &Mailbox {
        &self.from
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> NotificationResult<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(format!("to: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| NotificationError::send_failed(e.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotificationError::send_failed(e.to_string()))?;

        tracing::debug!(code = %response.code(), "email accepted by relay");
        Ok(())
    }
}

/// Drops every message. Used when SMTP is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: EmailMessage) -> NotificationResult<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "email delivery disabled, message dropped");
        Ok(())
    }
}
