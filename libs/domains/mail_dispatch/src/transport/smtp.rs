//! SMTP transport implementation using lettre.
//!
//! A lettre transport is built for every session, so each dispatch sees the
//! settings resolved for its own trigger.

use super::MailTransport;
use crate::error::DeliveryError;
use crate::headers::HeaderEncoder;
use crate::models::OutboundMessage;
use crate::session::{Authenticator, MailSession, SessionProperty};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::client::{Tls, TlsParameters},
};
use std::collections::HashSet;
use std::time::SystemTime;
use tracing::{debug, error, warn};

/// Port used when the session carries none.
const DEFAULT_PORT: u16 = 25;

const XMAILER_HEADER: &str = "X-Mailer";

/// How the connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TlsMode {
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// Upgrade with STARTTLS when the server offers it.
    StartTls,
    /// Plain text.
    None,
}

impl TlsMode {
    /// An SSL socket factory wins over the STARTTLS flag.
    pub(crate) fn from_session(session: &MailSession) -> Self {
        let ssl_factory = session
            .property(SessionProperty::SocketFactoryClass)
            .is_some_and(is_ssl_factory);
        if ssl_factory {
            TlsMode::Implicit
        } else if session.flag(SessionProperty::StartTls) {
            TlsMode::StartTls
        } else {
            TlsMode::None
        }
    }
}

fn is_ssl_factory(identifier: &str) -> bool {
    let identifier = identifier.trim();
    identifier.eq_ignore_ascii_case("ssl")
        || identifier.eq_ignore_ascii_case("tls")
        || identifier.contains("SSLSocketFactory")
}

/// SMTP transport backed by `lettre::AsyncSmtpTransport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub fn new() -> Self {
        Self
    }

    /// Build the lettre transport described by `session`.
    fn build_transport(
        session: &MailSession,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let host = session
            .property(SessionProperty::Host)
            .ok_or_else(|| DeliveryError::Message("no SMTP host configured".to_string()))?;
        let port = session
            .property(SessionProperty::Port)
            .map(str::parse::<u16>)
            .transpose()
            .map_err(|e| DeliveryError::Message(format!("invalid SMTP port: {e}")))?
            .unwrap_or(DEFAULT_PORT);

        let tls = match TlsMode::from_session(session) {
            TlsMode::Implicit => Tls::Wrapper(TlsParameters::new(host.to_string())?),
            TlsMode::StartTls => Tls::Opportunistic(TlsParameters::new(host.to_string())?),
            TlsMode::None => Tls::None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .tls(tls);

        // Credentials are pulled from the authenticator only when sending.
        if let Some(credentials) = session.authenticator().and_then(Authenticator::credentials) {
            builder = builder.credentials(credentials);
        }

        Ok(builder.build())
    }

    /// Build the lettre message for `message`.
    ///
    /// With several From addresses the first one is also the `Sender`.
    /// Custom headers that name a header the message sets itself are
    /// dropped, as are headers lettre cannot represent. Names compare
    /// case-insensitively and the first header of a name wins.
    pub(crate) fn build_message(message: &OutboundMessage) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .subject(message.subject.clone())
            .date(SystemTime::from(message.sent_at));

        for mailbox in &message.from {
            builder = builder.from(mailbox.clone());
        }
        if message.from.len() > 1 {
            builder = builder.sender(message.from[0].clone());
        }
        for mailbox in &message.to {
            builder = builder.to(mailbox.clone());
        }
        for mailbox in &message.cc {
            builder = builder.cc(mailbox.clone());
        }
        for mailbox in &message.bcc {
            builder = builder.bcc(mailbox.clone());
        }

        let mut written = HashSet::new();
        for header in &message.headers {
            if header.name != XMAILER_HEADER && HeaderEncoder::is_reserved(&header.name) {
                warn!(header = %header.name, "Skipping header that the message sets itself");
                continue;
            }
            if !written.insert(header.name.to_ascii_lowercase()) {
                warn!(header = %header.name, "Skipping repeated header");
                continue;
            }
            match HeaderEncoder::to_lettre(header) {
                Ok(value) => builder = builder.raw_header(value),
                Err(e) => warn!(header = %header.name, error = %e, "Skipping invalid header"),
            }
        }

        let content_type = ContentType::parse(&message.content_type).map_err(|e| {
            DeliveryError::Message(format!(
                "invalid content type '{}': {e}",
                message.content_type
            ))
        })?;

        Ok(builder.header(content_type).body(message.body.clone())?)
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(
        &self,
        session: &MailSession,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        debug!(
            host = ?session.property(SessionProperty::Host),
            port = ?session.property(SessionProperty::Port),
            tls = ?TlsMode::from_session(session),
            authenticated = session.authenticator().is_some(),
            recipients = message.recipient_count(),
            subject = %message.subject,
            "Sending email via SMTP"
        );

        let email = Self::build_message(message)?;
        let transport = Self::build_transport(session)?;

        let response = transport.send(email).await.map_err(|e| {
            error!(error = %e, "Failed to send email via SMTP");
            DeliveryError::Transport(e.to_string())
        })?;

        debug!(
            code = %response.code(),
            message = ?response.message().next(),
            "SMTP server accepted message"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self, session: &MailSession) -> Result<bool, DeliveryError> {
        Self::build_transport(session)?
            .test_connection()
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP health check failed: {e}")))
    }
}
