//! Outbound mail sessions
//!
//! A [`MailSession`] is opened once per cycle, used for any number of sends,
//! and closed exactly once. SMTP delivery goes through `lettre`.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{info, warn};
use std::time::Duration;
use thiserror::Error;

use crate::config::MailConfig;
use crate::formatters::format_subject;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Failed to connect to SMTP server {host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("SMTP server rejected credentials for {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("Invalid mail address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to send \"{subject}\": {reason}")]
    Send { subject: String, reason: String },

    #[error("Mail session is already closed")]
    SessionClosed,
}

/// Opens authenticated connections to a mail transport.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, settings: &MailConfig) -> Result<Box<dyn MailConnection>, MailError>;
}

/// One live connection. Owned by a [`MailSession`].
#[async_trait]
pub trait MailConnection: Send {
    async fn deliver(&mut self, subject: &str, body: &str) -> Result<(), MailError>;
    async fn quit(&mut self) -> Result<(), MailError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Closed,
}

pub struct MailSession {
    conn: Box<dyn MailConnection>,
    state: SessionState,
    receiver: String,
}

impl MailSession {
    pub async fn open(
        connector: &dyn MailConnector,
        settings: &MailConfig,
    ) -> Result<Self, MailError> {
        info!("Opening mail connection to {}:{}", settings.host, settings.port);
        let conn = connector.connect(settings).await?;
        Ok(Self {
            conn,
            state: SessionState::Opened,
            receiver: settings.receiver.clone(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Send one message with subject `New prices for {platform}`.
    pub async fn send(&mut self, platform: &str, body: &str) -> Result<(), MailError> {
        if self.state == SessionState::Closed {
            return Err(MailError::SessionClosed);
        }
        info!("Sending mail to {} for {}", self.receiver, platform);
        self.conn.deliver(&format_subject(platform), body).await
    }

    /// Release the connection. The session is closed even if QUIT fails.
    pub async fn close(&mut self) -> Result<(), MailError> {
        if self.state == SessionState::Closed {
            return Err(MailError::SessionClosed);
        }
        self.state = SessionState::Closed;
        info!("Closing mail connection");
        self.conn.quit().await
    }
}

impl Drop for MailSession {
    fn drop(&mut self) {
        if self.state == SessionState::Opened {
            warn!("Mail session dropped without being closed");
        }
    }
}

// ============================================================================
// SMTP
// ============================================================================

/// STARTTLS + login SMTP connector
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    timeout: Duration,
}

impl SmtpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SmtpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Reply codes that mean the server refused the login itself.
fn rejects_credentials(code: &str) -> bool {
    matches!(code, "534" | "535")
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl MailConnector for SmtpConnector {
    async fn connect(&self, settings: &MailConfig) -> Result<Box<dyn MailConnection>, MailError> {
        let from = parse_mailbox(&settings.sender)?;
        let to = parse_mailbox(&settings.receiver)?;

        let connection_error = |reason: String| MailError::Connection {
            host: settings.host.clone(),
            port: settings.port,
            reason,
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| connection_error(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.credential.clone(),
            ))
            .timeout(Some(self.timeout))
            .build();

        // Connects, upgrades to TLS and authenticates; the pooled connection
        // is reused by later sends.
        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => return Err(connection_error("server did not answer NOOP".to_string())),
            Err(e)
                if e
                    .status()
                    .map_or(false, |code| rejects_credentials(&code.to_string())) =>
            {
                return Err(MailError::Auth {
                    user: settings.sender.clone(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(connection_error(e.to_string())),
        }

        Ok(Box::new(SmtpConnection {
            transport: Some(transport),
            from,
            to,
        }))
    }
}

struct SmtpConnection {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    to: Mailbox,
}

#[async_trait]
impl MailConnection for SmtpConnection {
    async fn deliver(&mut self, subject: &str, body: &str) -> Result<(), MailError> {
        let send_error = |reason: String| MailError::Send {
            subject: subject.to_string(),
            reason,
        };

        let transport = self.transport.as_ref().ok_or(MailError::SessionClosed)?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| send_error(e.to_string()))?;

        transport
            .send(message)
            .await
            .map_err(|e| send_error(e.to_string()))?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), MailError> {
        // Sends QUIT on every pooled connection before releasing them.
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
        Ok(())
    }
}
