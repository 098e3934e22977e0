/// Outbound e-mail
///
/// The invite flow sends one message per invite after its transaction commits.
/// Delivery is best effort: the invite token is the credential, the e-mail only
/// carries it, so a failed send is logged by the caller and never undoes the invite.
///
/// Two implementations:
///
/// - [`SmtpMailer`]: lettre's async SMTP transport with STARTTLS
/// - [`LogMailer`]: writes the message to the log; selected when no SMTP host is
///   configured
///
/// # Example
///
/// ```no_run
/// use warden_shared::mailer::{from_config, MailConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = from_config(&MailConfig::default())?;
/// mailer.send("Welcome", "ada@example.com", "Hello").await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Mailer errors
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Sends a plain-text message to one recipient
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), MailerError>;
}

/// SMTP settings (`SMTP_*` variables)
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    /// No host selects [`LogMailer`]
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    /// Sender mailbox, e.g. `Warden <no-reply@example.com>`
    pub from: String,
}

/// Default sender when `SMTP_FROM` is unset
pub const DEFAULT_FROM: &str = "Warden <no-reply@localhost>";

/// Builds the mailer selected by the configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailerError> {
    match &config.smtp_host {
        Some(host) => Ok(Arc::new(SmtpMailer::new(config, host)?)),
        None => {
            info!("SMTP_HOST not set, invite e-mails will be logged instead of sent");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self, MailerError> {
        let from = parse_mailbox(if config.from.is_empty() {
            DEFAULT_FROM
        } else {
            &config.from
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailerError::Transport(e.to_string()))?
            .port(config.smtp_port.unwrap_or(587));

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host = %host, port = config.smtp_port.unwrap_or(587), "SMTP mailer initialized");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), MailerError> {
        let message = build_message(&self.from, subject, recipient, body)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        info!(subject = %subject, "E-mail sent");
        Ok(())
    }
}

/// Logs messages instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), MailerError> {
        parse_mailbox(recipient)?;
        info!(recipient = %recipient, subject = %subject, body_len = body.len(), "E-mail not sent (no SMTP configured)");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailerError> {
    address
        .parse()
        .map_err(|_| MailerError::InvalidAddress(address.to_string()))
}

fn build_message(
    from: &Mailbox,
    subject: &str,
    recipient: &str,
    body: &str,
) -> Result<Message, MailerError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(recipient)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailerError::Build(e.to_string()))
}
