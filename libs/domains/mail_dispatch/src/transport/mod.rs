//! Mail transport implementations.
//!
//! This module contains the `MailTransport` trait and implementations
//! that deliver an [`OutboundMessage`] using a [`MailSession`].

mod mock;
mod smtp;

pub use mock::MockTransport;
pub use smtp::SmtpTransport;

use crate::error::DeliveryError;
use crate::models::OutboundMessage;
use crate::session::MailSession;
use async_trait::async_trait;

/// Trait for mail delivery.
///
/// `send` is a single attempt. It resolves once the server accepted the
/// message or the attempt failed; implementations never retry.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `message` using the connection described by `session`.
    async fn send(&self, session: &MailSession, message: &OutboundMessage)
    -> Result<(), DeliveryError>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;

    /// Check that the transport can reach its server.
    async fn health_check(&self, session: &MailSession) -> Result<bool, DeliveryError>;
}
